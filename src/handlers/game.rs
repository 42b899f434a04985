use crate::middlewares::current_user;
use crate::models::*;
use crate::services::ParticipationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[utoipa::path(
    post,
    path = "/game/participate",
    tag = "game",
    request_body = ParticipateRequest,
    security(
        ("user_id" = [])
    ),
    responses(
        (status = 200, description = "参与成功", body = ParticipationResult),
        (status = 400, description = "参数错误或业务规则不满足"),
        (status = 404, description = "活动或玩法不存在")
    )
)]
/// 参与一次玩法:
/// 1. 校验活动状态与时间窗
/// 2. 校验玩法与用户状态
/// 3. 完成玩法目标后按概率与库存发奖
/// 4. 记录参与与奖品
pub async fn participate(
    service: web::Data<ParticipationService>,
    req: HttpRequest,
    payload: web::Json<ParticipateRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    // 客户端断开时 handler future 被丢弃，guard 触发取消
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match service.participate_in_game(&user, &payload, &cancel).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/game/status",
    tag = "game",
    params(GameQuery),
    security(
        ("user_id" = [])
    ),
    responses(
        (status = 200, description = "获取成功", body = GameStatusView),
        (status = 404, description = "活动或玩法不存在")
    )
)]
/// 获取玩法与当前用户的状态，不产生任何修改
pub async fn get_game_status(
    service: web::Data<ParticipationService>,
    req: HttpRequest,
    query: web::Query<GameQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .get_game_status(&user, query.activity_id, &query.game_name)
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/game/prize",
    tag = "game",
    params(GameQuery),
    security(
        ("user_id" = [])
    ),
    responses(
        (status = 200, description = "获取成功，未获奖时 data 为 null", body = PrizeView),
        (status = 404, description = "活动或玩法不存在")
    )
)]
pub async fn get_user_prize(
    service: web::Data<ParticipationService>,
    req: HttpRequest,
    query: web::Query<GameQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .get_user_prize(&user, query.activity_id, &query.game_name)
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn game_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/game")
            .route("/participate", web::post().to(participate))
            .route("/status", web::get().to(get_game_status))
            .route("/prize", web::get().to(get_user_prize)),
    );
}
