pub mod activity;
pub mod game;

pub use activity::activity_config;
pub use game::game_config;

use actix_web::{ResponseError, error::InternalError, web};

use crate::error::AppError;

/// 请求体 / 查询参数 / 路径参数解析失败统一返回 INVALID_PARAM
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = AppError::ValidationError(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let response = AppError::ValidationError(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        let response = AppError::ValidationError(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    }));
}
