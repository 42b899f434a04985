use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::repo::{ParticipationRecord, PrizeRecord};
use crate::rules::{
    AwardStatus, GameAction, GameState, LifecycleStatus, PlayDetail, PrizeGrant,
    PrizeRecordStatus, UserState,
};

/// 参与玩法请求
/// - post 玩法需要 post_id
/// - checkin 玩法可选 checkin_at，只作为客户端时间戳校验：必须是服务器当天且在活动时间窗内，签到日始终按服务器时间计
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ParticipateRequest {
    pub activity_id: i64,
    pub game_name: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub checkin_at: Option<DateTime<Utc>>,
}

impl ParticipateRequest {
    pub fn action(&self) -> GameAction {
        GameAction {
            post_id: self.post_id.clone(),
            checkin_at: self.checkin_at,
        }
    }
}

/// 玩法查询参数
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameQuery {
    pub activity_id: i64,
    pub game_name: String,
}

/// 一次参与的结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipationResult {
    pub participation_id: i64,
    pub activity_id: i64,
    pub game_name: String,
    pub game_type: String,
    pub target: String,
    /// 参与后的用户状态
    pub user_state: UserState,
    pub award: AwardStatus,
    /// 获得的奖品，未获得时为空
    pub prize: Option<PrizeGrant>,
    /// 玩法特有信息，例如签到天数
    #[schema(value_type = Object)]
    pub detail: PlayDetail,
    pub created_at: DateTime<Utc>,
}

/// 玩法状态视图（只读）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStatusView {
    pub activity_id: i64,
    pub game_name: String,
    pub game_type: String,
    pub activity_status: LifecycleStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub game_state: GameState,
    /// 玩法未开放时为 UNKNOWN
    pub user_state: UserState,
    pub total_num: Option<i64>,
    pub remain_num: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkin_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_days: Option<i64>,
}

/// 用户获得的奖品
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeView {
    pub activity_id: i64,
    pub game_name: String,
    pub prize_type: String,
    /// 折扣码或 SKU
    pub prize_id: String,
    pub price_rule_id: Option<i64>,
    pub title: Option<String>,
    pub status: PrizeRecordStatus,
    pub awarded_at: DateTime<Utc>,
}

impl From<PrizeRecord> for PrizeView {
    fn from(r: PrizeRecord) -> Self {
        PrizeView {
            activity_id: r.activity_id,
            game_name: r.game_name,
            prize_type: r.grant.prize_type,
            prize_id: r.grant.prize_id,
            price_rule_id: r.grant.price_rule_id,
            title: r.grant.title,
            status: r.status,
            awarded_at: r.created_at,
        }
    }
}

/// 参与记录
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipationView {
    pub id: i64,
    pub game_name: String,
    pub game_target: String,
    pub state: UserState,
    pub award: AwardStatus,
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ParticipationRecord> for ParticipationView {
    fn from(r: ParticipationRecord) -> Self {
        ParticipationView {
            id: r.id,
            game_name: r.game_name,
            game_target: r.game_target,
            state: r.state,
            award: r.award,
            detail: r.extra,
            created_at: r.created_at,
        }
    }
}
