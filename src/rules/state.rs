use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type ActivityId = i64;

/// 已通过上游网关识别的用户（核心不做鉴权）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// 玩法状态：与具体用户无关的运营开关
/// CLOSED 是终态，同一活动版本内不会再回到 OPEN
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl Default for GameState {
    fn default() -> Self {
        GameState::Open
    }
}

impl GameState {
    /// 合并两个来源的状态，任一方关闭即关闭
    pub fn merge(self, other: GameState) -> GameState {
        if self == GameState::Closed || other == GameState::Closed {
            GameState::Closed
        } else {
            GameState::Open
        }
    }
}

/// 用户在某个玩法下的参与状态
/// 只有在玩法状态为 OPEN 时才有意义
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserState {
    #[sea_orm(string_value = "unknown")]
    Unknown,
    /// 未参加
    #[sea_orm(string_value = "pending")]
    Pending,
    /// 已参加，还可以继续参加
    #[sea_orm(string_value = "open")]
    Open,
    /// 已有结果，不能再参加
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl UserState {
    pub fn can_participate(self) -> bool {
        !matches!(self, UserState::Closed)
    }
}

/// 活动存储状态（运营开关）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "online")]
    Online,
}

/// 由当前时间与活动时间窗推导出的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    NotStarted,
    Active,
    Ended,
}

/// 奖品发放记录状态
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum PrizeRecordStatus {
    /// 库存已扣减，等待外部发放
    #[sea_orm(string_value = "granted")]
    Granted,
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

/// 一次参与的奖励结果
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum AwardStatus {
    /// 尚未满足领奖条件（如签到天数不足）
    #[sea_orm(string_value = "progressed")]
    Progressed,
    #[sea_orm(string_value = "awarded")]
    Awarded,
    /// 满足条件但概率未抽中
    #[sea_orm(string_value = "not_drawn")]
    NotDrawn,
    /// 满足条件但库存已空
    #[sea_orm(string_value = "stock_empty")]
    StockEmpty,
}

/// 用户在某个玩法下的持久化进度，是 UserState 的唯一来源
/// version 用于 compare-and-set，0 表示尚无记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub state: UserState,
    pub streak: i64,
    pub last_checkin_on: Option<NaiveDate>,
    pub version: i64,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            state: UserState::Pending,
            streak: 0,
            last_checkin_on: None,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_game_state_wins_merge() {
        assert_eq!(GameState::Open.merge(GameState::Open), GameState::Open);
        assert_eq!(GameState::Open.merge(GameState::Closed), GameState::Closed);
        assert_eq!(GameState::Closed.merge(GameState::Open), GameState::Closed);
    }

    #[test]
    fn test_only_closed_user_state_blocks_participation() {
        assert!(UserState::Unknown.can_participate());
        assert!(UserState::Pending.can_participate());
        assert!(UserState::Open.can_participate());
        assert!(!UserState::Closed.can_participate());
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_string(&GameState::Open).unwrap(), "\"OPEN\"");
        assert_eq!(serde_json::to_string(&UserState::Closed).unwrap(), "\"CLOSED\"");
        assert_eq!(
            serde_json::to_string(&LifecycleStatus::NotStarted).unwrap(),
            "\"NOT_STARTED\""
        );
        assert_eq!(
            serde_json::to_string(&AwardStatus::StockEmpty).unwrap(),
            "\"stock_empty\""
        );
    }
}
