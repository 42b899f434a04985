use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rules::{ActivityStatus, GameState, LifecycleStatus};

/// 修改活动（仅修改提供的字段）
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateActivityRequest {
    pub name: Option<String>,
    /// unix 秒
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub start_at: Option<DateTime<Utc>>,
    /// unix 秒
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    #[schema(value_type = Option<i64>)]
    pub end_at: Option<DateTime<Utc>>,
    pub status: Option<ActivityStatus>,
}

/// 玩法快照
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSnapshot {
    pub name: String,
    pub game_type: String,
    /// 配置状态与运营状态合并后的玩法状态
    pub state: GameState,
    /// 奖品库存 (None = 无限)
    pub total_num: Option<i64>,
    pub remain_num: Option<i64>,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

/// 活动快照（管理端可见 DRAFT）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivitySnapshot {
    pub id: i64,
    pub category: String,
    pub version: String,
    pub name: String,
    pub status: ActivityStatus,
    pub lifecycle: LifecycleStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub games: Vec<GameSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_reads_unix_seconds() {
        let req: UpdateActivityRequest =
            serde_json::from_str(r#"{"end_at": 1700600000, "status": "ONLINE"}"#).unwrap();
        assert!(req.start_at.is_none());
        assert_eq!(req.end_at.unwrap().timestamp(), 1_700_600_000);
        assert_eq!(req.status, Some(ActivityStatus::Online));
    }
}
