use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::CommunityConfig;
use crate::error::{AppError, AppResult};
use crate::rules::{ContentService, User};

/// 社区服务客户端：查询帖子归属
#[derive(Clone)]
pub struct CommunityClient {
    http: Client,
    cfg: CommunityConfig,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    #[serde(default)]
    success: bool,
    data: Option<PostData>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    author_id: String,
    #[serde(default)]
    deleted: bool,
}

impl CommunityClient {
    pub fn new(cfg: CommunityConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("activity-backend/community")
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn is_enabled(&self) -> bool {
        !self.cfg.base_url.is_empty()
    }

    fn post_url(&self, post_id: &str) -> String {
        format!(
            "{}/api/v1/posts/{}",
            self.cfg.base_url.trim_end_matches('/'),
            post_id
        )
    }
}

#[async_trait]
impl ContentService for CommunityClient {
    /// 帖子存在、未删除且作者为该用户时返回 true
    async fn post_exists(&self, user: &User, post_id: &str) -> AppResult<bool> {
        if !self.is_enabled() {
            return Err(AppError::ExternalApiError(
                "community service is not configured".into(),
            ));
        }

        let mut req = self.http.get(self.post_url(post_id));
        if !self.cfg.api_key.is_empty() {
            req = req.header("X-Api-Key", &self.cfg.api_key);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(AppError::ExternalApiError(format!(
                "community post lookup failed: HTTP {}",
                status.as_u16()
            )));
        }

        let body: PostResponse = resp.json().await?;
        Ok(match body.data {
            Some(post) if body.success => !post.deleted && post.author_id == user.uid,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> CommunityClient {
        CommunityClient::new(CommunityConfig {
            base_url: base_url.into(),
            api_key: String::new(),
            timeout_ms: 500,
        })
        .unwrap()
    }

    #[test]
    fn test_post_url_joins_base() {
        assert_eq!(
            client("https://community.example.com/").post_url("p-1"),
            "https://community.example.com/api/v1/posts/p-1"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_is_system_error() {
        let err = client("")
            .post_exists(&User::new("u1"), "p-1")
            .await
            .unwrap_err();
        assert!(err.kind().is_system());
    }

    #[test]
    fn test_post_response_shape() {
        let body: PostResponse = serde_json::from_str(
            r#"{"success":true,"data":{"author_id":"u1","title":"hello"}}"#,
        )
        .unwrap();
        let post = body.data.unwrap();
        assert_eq!(post.author_id, "u1");
        assert!(!post.deleted);
    }
}
