use crate::middlewares::current_user;
use crate::models::*;
use crate::services::{ActivityService, ParticipationService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/activity",
    tag = "activity",
    request_body(content = Object, description = "活动配置 {category, version, name, start_at, end_at, games}"),
    responses(
        (status = 200, description = "创建成功（DRAFT）", body = ActivitySnapshot),
        (status = 400, description = "配置不合法")
    )
)]
/// 创建活动，配置整体校验通过后以 DRAFT 状态保存
pub async fn create_activity(
    service: web::Data<ActivityService>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    match service.create_activity(&payload).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/activity/{id}",
    tag = "activity",
    params(("id" = i64, Path, description = "活动ID")),
    responses(
        (status = 200, description = "获取成功", body = ActivitySnapshot),
        (status = 404, description = "活动不存在")
    )
)]
pub async fn get_activity(
    service: web::Data<ActivityService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.get_activity(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/activity/{id}",
    tag = "activity",
    params(("id" = i64, Path, description = "活动ID")),
    request_body = UpdateActivityRequest,
    responses(
        (status = 200, description = "修改成功", body = ActivitySnapshot),
        (status = 400, description = "参数错误"),
        (status = 404, description = "活动不存在")
    )
)]
/// 修改名称、时间窗或状态，修改后的配置会重新校验
pub async fn update_activity(
    service: web::Data<ActivityService>,
    path: web::Path<i64>,
    payload: web::Json<UpdateActivityRequest>,
) -> Result<HttpResponse> {
    match service
        .update_activity(path.into_inner(), payload.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/activity/{id}",
    tag = "activity",
    params(("id" = i64, Path, description = "活动ID")),
    responses(
        (status = 200, description = "归档成功"),
        (status = 404, description = "活动不存在")
    )
)]
pub async fn archive_activity(
    service: web::Data<ActivityService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.archive_activity(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::<()>::success_with_message(
            (),
            "Activity archived".to_string(),
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/activity/{id}/publish",
    tag = "activity",
    params(("id" = i64, Path, description = "活动ID")),
    responses(
        (status = 200, description = "发布成功", body = ActivitySnapshot),
        (status = 404, description = "活动不存在")
    )
)]
/// DRAFT -> ONLINE，重复发布无副作用
pub async fn publish_activity(
    service: web::Data<ActivityService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.publish_activity(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/activity/{id}/games/{game_name}/close",
    tag = "activity",
    params(
        ("id" = i64, Path, description = "活动ID"),
        ("game_name" = String, Path, description = "玩法名称")
    ),
    responses(
        (status = 200, description = "玩法已关闭", body = ActivitySnapshot),
        (status = 404, description = "活动或玩法不存在")
    )
)]
pub async fn close_game(
    service: web::Data<ActivityService>,
    path: web::Path<(i64, String)>,
) -> Result<HttpResponse> {
    let (id, game_name) = path.into_inner();
    match service.close_game(id, &game_name).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/activity/{id}/participations",
    tag = "activity",
    params(
        ("id" = i64, Path, description = "活动ID"),
        PaginationParams,
    ),
    security(
        ("user_id" = [])
    ),
    responses(
        (status = 200, description = "获取成功", body = PaginatedResponse<ParticipationView>),
        (status = 400, description = "缺少用户身份"),
        (status = 404, description = "活动不存在")
    )
)]
/// 分页获取当前用户在活动中的参与记录（倒序）
pub async fn list_participations(
    service: web::Data<ParticipationService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .list_participations(&user, path.into_inner(), &query)
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn activity_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/activity")
            .route("", web::post().to(create_activity))
            .route("/{id}", web::get().to(get_activity))
            .route("/{id}", web::put().to(update_activity))
            .route("/{id}", web::delete().to(archive_activity))
            .route("/{id}/publish", web::post().to(publish_activity))
            .route("/{id}/games/{game_name}/close", web::post().to(close_game))
            .route("/{id}/participations", web::get().to(list_participations)),
    );
}
