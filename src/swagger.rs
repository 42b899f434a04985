use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ErrorKind;
use crate::handlers;
use crate::models::*;
use crate::rules::{
    ActivityStatus, AwardStatus, GameState, LifecycleStatus, PrizeGrant, PrizeRecordStatus,
    UserState,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::middlewares::USER_ID_HEADER,
                ))),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::activity::create_activity,
        handlers::activity::get_activity,
        handlers::activity::update_activity,
        handlers::activity::archive_activity,
        handlers::activity::publish_activity,
        handlers::activity::close_game,
        handlers::activity::list_participations,
        handlers::game::participate,
        handlers::game::get_game_status,
        handlers::game::get_user_prize,
    ),
    components(
        schemas(
            ActivitySnapshot,
            GameSnapshot,
            UpdateActivityRequest,
            ParticipateRequest,
            ParticipationResult,
            GameStatusView,
            PrizeView,
            ParticipationView,
            PrizeGrant,
            PaginationParams,
            ActivityStatus,
            LifecycleStatus,
            GameState,
            UserState,
            AwardStatus,
            PrizeRecordStatus,
            ErrorKind,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "activity", description = "Activity management API"),
        (name = "game", description = "Game participation API"),
    ),
    info(
        title = "Activity Backend API",
        version = "1.0.0",
        description = "Promotional activity / game / prize REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
