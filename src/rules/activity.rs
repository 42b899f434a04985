use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::game::Game;
use super::state::{ActivityId, ActivityStatus, LifecycleStatus};
use crate::error::{AppError, AppResult};

/// 配置文档中的单个玩法
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(rename = "type")]
    pub game_type: String,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// 活动配置文档，时间使用 unix 秒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub category: String,
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub games: Vec<GameConfig>,
}

impl ActivityConfig {
    pub fn from_value(raw: &serde_json::Value) -> AppResult<Self> {
        serde_json::from_value(raw.clone())
            .map_err(|e| AppError::InvalidConfig(format!("malformed activity config: {e}")))
    }
}

/// 校验通过的活动定义，构建后只读，可在并发请求间共享
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDefinition {
    pub category: String,
    pub version: String,
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub games: Vec<Game>,
}

impl ActivityDefinition {
    /// 时间窗为 [start_at, end_at)
    pub fn lifecycle(&self, now: DateTime<Utc>) -> LifecycleStatus {
        if now < self.start_at {
            LifecycleStatus::NotStarted
        } else if now < self.end_at {
            LifecycleStatus::Active
        } else {
            LifecycleStatus::Ended
        }
    }

    pub fn resolve_game(&self, name: &str) -> AppResult<&Game> {
        self.games
            .iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| AppError::GameNotFound(name.to_string()))
    }

    pub fn to_config(&self) -> ActivityConfig {
        ActivityConfig {
            category: self.category.clone(),
            version: self.version.clone(),
            name: self.name.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            games: self
                .games
                .iter()
                .map(|g| GameConfig {
                    game_type: g.game_type().to_string(),
                    name: g.name().to_string(),
                    config: g.rule().config_value(),
                })
                .collect(),
        }
    }
}

/// 已存储的活动
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: ActivityId,
    pub status: ActivityStatus,
    pub definition: ActivityDefinition,
}

impl Activity {
    pub fn lifecycle(&self, now: DateTime<Utc>) -> LifecycleStatus {
        self.definition.lifecycle(now)
    }

    pub fn resolve_game(&self, name: &str) -> AppResult<&Game> {
        self.definition.resolve_game(name)
    }

    /// 用户侧参与前的活动级检查
    /// DRAFT 活动对用户不可见，按不存在处理
    pub fn ensure_participable(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != ActivityStatus::Online {
            return Err(AppError::ActivityNotFound);
        }
        match self.lifecycle(now) {
            LifecycleStatus::NotStarted => Err(AppError::ActivityNotStarted),
            LifecycleStatus::Ended => Err(AppError::ActivityEnded),
            LifecycleStatus::Active => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::registry::ActivityRegistry;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
    }

    fn config() -> serde_json::Value {
        serde_json::json!({
            "category": "community",
            "version": "v1",
            "name": "Spring posting",
            "start_at": start().timestamp(),
            "end_at": (start() + Duration::days(7)).timestamp(),
            "games": [
                { "type": "post", "name": "post-to-win", "config": {
                    "state": "OPEN",
                    "prize": { "kind": "discount_code", "discount_code": "SPRING24",
                               "price_rule_id": 123, "probability_bp": 10000, "total_num": 100 } } },
                { "type": "checkin", "name": "three-day-streak", "config": {
                    "required_days": 3,
                    "prize": { "kind": "product_sku", "sku": "SKU-1", "title": "Mug", "total_num": 10 } } }
            ]
        })
    }

    fn activity(status: ActivityStatus) -> Activity {
        Activity {
            id: 1,
            status,
            definition: ActivityRegistry::standard().parse_value(&config()).unwrap(),
        }
    }

    #[test]
    fn test_lifecycle_window_boundaries() {
        let activity = activity(ActivityStatus::Online);
        let end = start() + Duration::days(7);
        assert_eq!(
            activity.lifecycle(start() - Duration::seconds(1)),
            LifecycleStatus::NotStarted
        );
        assert_eq!(activity.lifecycle(start()), LifecycleStatus::Active);
        assert_eq!(
            activity.lifecycle(end - Duration::seconds(1)),
            LifecycleStatus::Active
        );
        assert_eq!(activity.lifecycle(end), LifecycleStatus::Ended);
    }

    #[test]
    fn test_draft_is_not_participable_inside_window() {
        let now = start() + Duration::hours(1);
        assert!(matches!(
            activity(ActivityStatus::Draft).ensure_participable(now),
            Err(AppError::ActivityNotFound)
        ));
        assert!(activity(ActivityStatus::Online).ensure_participable(now).is_ok());
        assert!(matches!(
            activity(ActivityStatus::Online).ensure_participable(start() + Duration::days(8)),
            Err(AppError::ActivityEnded)
        ));
    }

    #[test]
    fn test_resolve_game_by_name() {
        let activity = activity(ActivityStatus::Online);
        assert_eq!(
            activity.resolve_game("three-day-streak").unwrap().game_type(),
            "checkin"
        );
        assert!(matches!(
            activity.resolve_game("missing"),
            Err(AppError::GameNotFound(_))
        ));
    }

    #[test]
    fn test_config_round_trip_preserves_definition() {
        let registry = ActivityRegistry::standard();
        let built = registry.parse_value(&config()).unwrap();

        let stored = serde_json::to_value(built.to_config()).unwrap();
        let reloaded = registry.parse_value(&stored).unwrap();

        assert_eq!(reloaded.category, built.category);
        assert_eq!(reloaded.version, built.version);
        assert_eq!(reloaded.start_at, built.start_at);
        assert_eq!(reloaded.end_at, built.end_at);
        assert_eq!(reloaded.games, built.games);
    }
}
