use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

/// 对外稳定的错误类别
/// 客户端应依据 code / errno 分支处理，而不是依赖 message 文本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SystemError,
    InvalidParam,
    ActivityNotFound,
    ActivityEnded,
    ActivityNotStarted,
    GameNotFound,
    GameClosed,
    UserCannotParticipate,
    StockEmpty,
    UserNotPosted,
    AlreadyCheckedIn,
    InvalidConfig,
    PrizeNotConfigured,
    RequestCancelled,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::SystemError,
        ErrorKind::InvalidParam,
        ErrorKind::ActivityNotFound,
        ErrorKind::ActivityEnded,
        ErrorKind::ActivityNotStarted,
        ErrorKind::GameNotFound,
        ErrorKind::GameClosed,
        ErrorKind::UserCannotParticipate,
        ErrorKind::StockEmpty,
        ErrorKind::UserNotPosted,
        ErrorKind::AlreadyCheckedIn,
        ErrorKind::InvalidConfig,
        ErrorKind::PrizeNotConfigured,
        ErrorKind::RequestCancelled,
    ];

    /// 数字错误码
    pub fn errno(self) -> i32 {
        match self {
            ErrorKind::SystemError => 10000,
            ErrorKind::InvalidParam => 10001,
            ErrorKind::ActivityNotFound => 10002,
            ErrorKind::ActivityEnded => 10003,
            ErrorKind::ActivityNotStarted => 10004,
            ErrorKind::GameNotFound => 10005,
            ErrorKind::GameClosed => 10006,
            ErrorKind::UserCannotParticipate => 10007,
            ErrorKind::StockEmpty => 10008,
            ErrorKind::UserNotPosted => 10009,
            ErrorKind::AlreadyCheckedIn => 10010,
            ErrorKind::InvalidConfig => 10011,
            ErrorKind::PrizeNotConfigured => 10012,
            ErrorKind::RequestCancelled => 10013,
        }
    }

    /// 字符串错误码
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SystemError => "SYSTEM_ERROR",
            ErrorKind::InvalidParam => "INVALID_PARAM",
            ErrorKind::ActivityNotFound => "ACTIVITY_NOT_FOUND",
            ErrorKind::ActivityEnded => "ACTIVITY_ENDED",
            ErrorKind::ActivityNotStarted => "ACTIVITY_NOT_STARTED",
            ErrorKind::GameNotFound => "GAME_NOT_FOUND",
            ErrorKind::GameClosed => "GAME_CLOSED",
            ErrorKind::UserCannotParticipate => "USER_CANNOT_PARTICIPATE",
            ErrorKind::StockEmpty => "STOCK_EMPTY",
            ErrorKind::UserNotPosted => "USER_NOT_POSTED",
            ErrorKind::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::PrizeNotConfigured => "PRIZE_NOT_CONFIGURED",
            ErrorKind::RequestCancelled => "REQUEST_CANCELLED",
        }
    }

    /// 默认提示文案
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::SystemError => "System error",
            ErrorKind::InvalidParam => "Invalid parameter",
            ErrorKind::ActivityNotFound => "Activity not found",
            ErrorKind::ActivityEnded => "Activity has ended",
            ErrorKind::ActivityNotStarted => "Activity has not started",
            ErrorKind::GameNotFound => "Game not found",
            ErrorKind::GameClosed => "Game is closed",
            ErrorKind::UserCannotParticipate => "User cannot participate in this game",
            ErrorKind::StockEmpty => "Prize stock is empty",
            ErrorKind::UserNotPosted => "User has not posted",
            ErrorKind::AlreadyCheckedIn => "User has already checked in today",
            ErrorKind::InvalidConfig => "Invalid activity configuration",
            ErrorKind::PrizeNotConfigured => "Prize is not configured",
            ErrorKind::RequestCancelled => "Request was cancelled before completion",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::SystemError | ErrorKind::PrizeNotConfigured => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorKind::InvalidParam | ErrorKind::InvalidConfig => StatusCode::BAD_REQUEST,
            ErrorKind::ActivityNotFound | ErrorKind::GameNotFound => StatusCode::NOT_FOUND,
            ErrorKind::UserNotPosted => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::RequestCancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        }
    }

    /// 是否属于系统类错误（5xx）
    pub fn is_system(self) -> bool {
        self.status_code().is_server_error()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid parameter: {0}")]
    ValidationError(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Activity not found")]
    ActivityNotFound,

    #[error("Activity not started")]
    ActivityNotStarted,

    #[error("Activity ended")]
    ActivityEnded,

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Game is closed")]
    GameClosed,

    #[error("User cannot participate")]
    UserCannotParticipate,

    #[error("Prize stock is empty")]
    StockEmpty,

    #[error("User has not posted")]
    UserNotPosted,

    #[error("Already checked in on {0}")]
    AlreadyCheckedIn(chrono::NaiveDate),

    #[error("Prize is not configured for game {0}")]
    PrizeNotConfigured(String),

    #[error("Request cancelled")]
    RequestCancelled,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_) => ErrorKind::InvalidParam,
            AppError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            AppError::ActivityNotFound => ErrorKind::ActivityNotFound,
            AppError::ActivityNotStarted => ErrorKind::ActivityNotStarted,
            AppError::ActivityEnded => ErrorKind::ActivityEnded,
            AppError::GameNotFound(_) => ErrorKind::GameNotFound,
            AppError::GameClosed => ErrorKind::GameClosed,
            AppError::UserCannotParticipate => ErrorKind::UserCannotParticipate,
            AppError::StockEmpty => ErrorKind::StockEmpty,
            AppError::UserNotPosted => ErrorKind::UserNotPosted,
            AppError::AlreadyCheckedIn(_) => ErrorKind::AlreadyCheckedIn,
            AppError::PrizeNotConfigured(_) => ErrorKind::PrizeNotConfigured,
            AppError::RequestCancelled => ErrorKind::RequestCancelled,
            AppError::DatabaseError(_)
            | AppError::ExternalApiError(_)
            | AppError::ReqwestError(_)
            | AppError::SerdeJsonError(_)
            | AppError::TaskJoinError(_)
            | AppError::InternalError(_) => ErrorKind::SystemError,
        }
    }

    /// 返回给客户端的文案，系统错误不暴露内部细节
    fn client_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) | AppError::InvalidConfig(msg) => msg.clone(),
            AppError::GameNotFound(name) => format!("Game not found: {name}"),
            other => other.kind().message().to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let kind = self.kind();
        if kind.is_system() {
            log::error!("{}: {self}", kind.as_str());
        } else {
            log::debug!("{}: {self}", kind.as_str());
        }

        HttpResponse::build(kind.status_code()).json(ApiResponse::<()>::error(
            kind.as_str().to_string(),
            kind.errno(),
            self.client_message(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_codes_are_unique_and_stable() {
        let errnos: HashSet<i32> = ErrorKind::ALL.iter().map(|k| k.errno()).collect();
        let names: HashSet<&str> = ErrorKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(errnos.len(), ErrorKind::ALL.len());
        assert_eq!(names.len(), ErrorKind::ALL.len());

        assert_eq!(ErrorKind::SystemError.errno(), 10000);
        assert_eq!(ErrorKind::StockEmpty.errno(), 10008);
        assert_eq!(ErrorKind::UserNotPosted.as_str(), "USER_NOT_POSTED");
    }

    #[test]
    fn test_infrastructure_errors_are_system_class() {
        let err = AppError::DatabaseError(sea_orm::DbErr::Custom("boom".into()));
        assert_eq!(err.kind(), ErrorKind::SystemError);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // 不向客户端泄露内部错误
        assert_eq!(err.client_message(), "System error");

        let err = AppError::PrizeNotConfigured("post".into());
        assert!(err.kind().is_system());
    }

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        assert_eq!(AppError::StockEmpty.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::ActivityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::ValidationError("post_id is required".into()).client_message(),
            "post_id is required"
        );
        assert!(!AppError::UserCannotParticipate.kind().is_system());
    }
}
