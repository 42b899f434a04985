use std::sync::Arc;

use actix_web::{App, ResponseError, http::StatusCode, test, web};
use activity_backend::config::EngineConfig;
use activity_backend::error::AppResult;
use activity_backend::handlers;
use activity_backend::middlewares::IdentityMiddleware;
use activity_backend::repo::{ActivityRepo, MemoryRepo};
use activity_backend::rules::{ActivityRegistry, ContentService, User};
use activity_backend::services::{ActivityService, ParticipationService};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

struct AnyPost;

#[async_trait]
impl ContentService for AnyPost {
    async fn post_exists(&self, _user: &User, _post_id: &str) -> AppResult<bool> {
        Ok(true)
    }
}

fn services() -> (ActivityService, ParticipationService) {
    let repo: Arc<dyn ActivityRepo> = Arc::new(MemoryRepo::new());
    let activities = ActivityService::new(repo.clone(), Arc::new(ActivityRegistry::standard()));
    let participation = ParticipationService::new(
        activities.clone(),
        repo,
        Arc::new(AnyPost),
        &EngineConfig::default(),
    );
    (activities, participation)
}

fn activity_doc() -> Value {
    let now = Utc::now();
    json!({
        "category": "community",
        "version": "v1",
        "name": "Spring posting",
        "start_at": (now - Duration::days(1)).timestamp(),
        "end_at": (now + Duration::days(1)).timestamp(),
        "games": [{
            "type": "post",
            "name": "post-to-win",
            "config": {
                "state": "OPEN",
                "prize": { "kind": "discount_code", "discount_code": "SPRING24", "price_rule_id": 7, "total_num": 2 }
            }
        }]
    })
}

macro_rules! app {
    ($activities:expr, $participation:expr) => {
        test::init_service(
            App::new()
                .wrap(IdentityMiddleware::new())
                .app_data(web::Data::new($activities))
                .app_data(web::Data::new($participation))
                .configure(handlers::extractor_config)
                .service(
                    web::scope("/api/v1")
                        .configure(handlers::activity_config)
                        .configure(handlers::game_config),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_create_publish_and_participate() {
    let (activities, participation) = services();
    let app = app!(activities, participation);

    let req = test::TestRequest::post()
        .uri("/api/v1/activity")
        .set_json(activity_doc())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "DRAFT");
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/activity/{id}/publish"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "ONLINE");
    assert_eq!(body["data"]["lifecycle"], "ACTIVE");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/game/prize?activity_id={id}&game_name=post-to-win"))
        .insert_header(("X-User-Id", "alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());

    let req = test::TestRequest::post()
        .uri("/api/v1/game/participate")
        .insert_header(("X-User-Id", "alice"))
        .set_json(json!({ "activity_id": id, "game_name": "post-to-win", "post_id": "p-1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["award"], "awarded");
    assert_eq!(body["data"]["user_state"], "CLOSED");
    assert_eq!(body["data"]["prize"]["prize_id"], "SPRING24");
    assert_eq!(body["data"]["detail"]["post_id"], "p-1");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/game/status?activity_id={id}&game_name=post-to-win"))
        .insert_header(("X-User-Id", "alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["remain_num"], 1);
    assert_eq!(body["data"]["user_state"], "CLOSED");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/activity/{id}/participations?page=1&per_page=10"))
        .insert_header(("X-User-Id", "alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["game_target"], "p-1");
}

#[actix_web::test]
async fn test_business_errors_carry_stable_codes() {
    let (activities, participation) = services();
    let app = app!(activities, participation);

    let req = test::TestRequest::post()
        .uri("/api/v1/activity")
        .set_json(activity_doc())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();

    // DRAFT 对用户不可见
    let req = test::TestRequest::post()
        .uri("/api/v1/game/participate")
        .insert_header(("X-User-Id", "alice"))
        .set_json(json!({ "activity_id": id, "game_name": "post-to-win", "post_id": "p-1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "ACTIVITY_NOT_FOUND");
    assert_eq!(body["error"]["errno"], 10002);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/activity/{id}/publish"))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/game/participate")
        .insert_header(("X-User-Id", "alice"))
        .set_json(json!({ "activity_id": id, "game_name": "spin" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "GAME_NOT_FOUND");
}

#[actix_web::test]
async fn test_malformed_requests_are_invalid_params() {
    let (activities, participation) = services();
    let app = app!(activities, participation);

    let req = test::TestRequest::post()
        .uri("/api/v1/game/participate")
        .insert_header(("X-User-Id", "alice"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["errno"], 10001);

    let req = test::TestRequest::post()
        .uri("/api/v1/activity")
        .set_json(json!({ "category": "community" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_CONFIG");
}

#[actix_web::test]
async fn test_game_endpoints_require_user_identity() {
    let (activities, participation) = services();
    let app = app!(activities, participation);

    let req = test::TestRequest::get()
        .uri("/api/v1/game/status?activity_id=1&game_name=post-to-win")
        .to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    let resp = err.as_response_error().error_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // 管理端接口不需要用户身份
    let req = test::TestRequest::get().uri("/api/v1/activity/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
