//! 用户身份
//!
//! 身份由上游网关完成鉴权后通过 `X-User-Id` 头透传，这里只负责读取并放入请求扩展

use crate::error::AppError;
use crate::rules::User;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

pub const USER_ID_HEADER: &str = "X-User-Id";

// 必须携带用户身份的路径
struct IdentityPaths {
    prefix_paths: Vec<&'static str>,
    suffix_paths: Vec<&'static str>,
}

impl IdentityPaths {
    fn new() -> Self {
        Self {
            prefix_paths: vec!["/api/v1/game/"],
            suffix_paths: vec!["/participations"],
        }
    }

    fn requires_identity(&self, path: &str) -> bool {
        self.prefix_paths.iter().any(|&p| path.starts_with(p))
            || self.suffix_paths.iter().any(|&s| path.ends_with(s))
    }
}

fn user_from_header(req: &ServiceRequest) -> Option<User> {
    let uid = req.headers().get(USER_ID_HEADER)?.to_str().ok()?.trim();
    if uid.is_empty() {
        return None;
    }
    Some(User::new(uid))
}

#[derive(Default)]
pub struct IdentityMiddleware;

impl IdentityMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = IdentityMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService {
            service,
            paths: IdentityPaths::new(),
        }))
    }
}

pub struct IdentityMiddlewareService<S> {
    service: S,
    paths: IdentityPaths,
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        match user_from_header(&req) {
            Some(user) => {
                req.extensions_mut().insert(user);
                Box::pin(self.service.call(req))
            }
            None if self.paths.requires_identity(req.path()) => {
                let error = AppError::ValidationError(format!("{USER_ID_HEADER} header is required"));
                Box::pin(async move { Err(error.into()) })
            }
            None => Box::pin(self.service.call(req)),
        }
    }
}

/// 获取当前用户（由中间件注入）
pub fn current_user(req: &HttpRequest) -> Result<User, AppError> {
    req.extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::ValidationError(format!("{USER_ID_HEADER} header is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_paths() {
        let paths = IdentityPaths::new();
        assert!(paths.requires_identity("/api/v1/game/participate"));
        assert!(paths.requires_identity("/api/v1/activity/3/participations"));
        assert!(!paths.requires_identity("/api/v1/activity/3"));
        assert!(!paths.requires_identity("/swagger-ui/"));
    }
}
