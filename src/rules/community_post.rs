use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::game::{ContentService, GameAction, GameRule, Play, PlayDetail, PlayEnv};
use super::prize::Prize;
use super::state::{GameState, User, UserProgress, UserState};
use crate::error::{AppError, AppResult};

pub const GAME_TYPE: &str = "post";

/// 社区发帖玩法配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityPostConfig {
    #[serde(default)]
    pub state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize: Option<Prize>,
}

/// 社区发帖玩法：用户发帖后领取一次奖励
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityPostGame {
    name: String,
    config: CommunityPostConfig,
}

impl CommunityPostGame {
    pub fn new(name: impl Into<String>, config: CommunityPostConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn from_value(name: &str, raw: &serde_json::Value) -> AppResult<Self> {
        let config: CommunityPostConfig = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::InvalidConfig(format!("game {name}: invalid post config: {e}"))
        })?;
        Ok(Self::new(name, config))
    }
}

fn post_id(action: &GameAction) -> AppResult<&str> {
    action
        .post_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ValidationError("post_id is required".into()))
}

#[async_trait]
impl GameRule for CommunityPostGame {
    fn name(&self) -> &str {
        &self.name
    }

    fn game_type(&self) -> &'static str {
        GAME_TYPE
    }

    fn configured_state(&self) -> GameState {
        self.config.state
    }

    fn prize(&self) -> Option<&Prize> {
        self.config.prize.as_ref()
    }

    fn validate_config(&self) -> AppResult<()> {
        match &self.config.prize {
            None => Err(AppError::InvalidConfig(format!(
                "game {}: prize is not configured",
                self.name
            ))),
            Some(prize) => prize.validate(),
        }
    }

    async fn verify(
        &self,
        content: &dyn ContentService,
        user: &User,
        action: &GameAction,
    ) -> AppResult<()> {
        let post_id = post_id(action)?;
        if !content.post_exists(user, post_id).await? {
            return Err(AppError::UserNotPosted);
        }
        Ok(())
    }

    fn play(&self, _env: &PlayEnv, progress: &UserProgress, action: &GameAction) -> AppResult<Play> {
        let post_id = post_id(action)?;

        // 每个用户在一个发帖玩法中只有一次结果
        Ok(Play {
            target: post_id.to_string(),
            next: UserProgress {
                state: UserState::Closed,
                ..progress.clone()
            },
            qualifies: true,
            detail: PlayDetail::Post {
                post_id: post_id.to_string(),
            },
        })
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    struct Posts(&'static [(&'static str, &'static str)]);

    #[async_trait]
    impl ContentService for Posts {
        async fn post_exists(&self, user: &User, post_id: &str) -> AppResult<bool> {
            Ok(self
                .0
                .iter()
                .any(|(uid, id)| *uid == user.uid && *id == post_id))
        }
    }

    fn game() -> CommunityPostGame {
        CommunityPostGame::from_value(
            "post-to-win",
            &serde_json::json!({
                "prize": { "kind": "discount_code", "discount_code": "C1", "total_num": 1 }
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_post_game_requires_prize() {
        let game = CommunityPostGame::from_value("p", &serde_json::json!({})).unwrap();
        assert!(matches!(
            game.validate_config(),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(self::game().validate_config().is_ok());
        assert_eq!(self::game().configured_state(), GameState::Open);
    }

    fn env() -> PlayEnv {
        let now = Utc::now();
        PlayEnv {
            now,
            start_at: now - Duration::days(1),
            end_at: now + Duration::days(1),
        }
    }

    #[tokio::test]
    async fn test_owned_post_is_verified() {
        let content = Posts(&[("u1", "p-1")]);
        game()
            .verify(&content, &User::new("u1"), &GameAction::post(" p-1 "))
            .await
            .unwrap();
    }

    #[test]
    fn test_valid_post_closes_user_and_qualifies() {
        let play = game()
            .play(&env(), &UserProgress::default(), &GameAction::post("p-1"))
            .unwrap();
        assert!(play.qualifies);
        assert_eq!(play.next.state, UserState::Closed);
        assert_eq!(play.target, "p-1");
    }

    #[tokio::test]
    async fn test_foreign_or_missing_post_is_rejected() {
        let content = Posts(&[("u1", "p-1")]);
        let err = game()
            .verify(&content, &User::new("u2"), &GameAction::post("p-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotPosted));

        let err = game()
            .verify(&content, &User::new("u1"), &GameAction::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = game()
            .play(&env(), &UserProgress::default(), &GameAction::default())
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
