//! 持久化能力：活动读写与参与工作单元

mod memory;
mod sea;

pub use memory::MemoryRepo;
pub use sea::{SeaRepo, connect};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::rules::{
    ActivityId, ActivityStatus, AwardStatus, GameLedger, GameSlot, GameState, PrizeGrant,
    PrizeRecordStatus, UserProgress, UserState,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NewGame {
    pub game_name: String,
    pub game_type: String,
    pub state: GameState,
    /// 奖品库存 (None = 无限)
    pub total_num: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub category: String,
    pub version: String,
    pub name: String,
    pub config: serde_json::Value,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ActivityStatus,
    pub games: Vec<NewGame>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub category: String,
    pub version: String,
    pub name: String,
    pub config: serde_json::Value,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 只修改 Some 的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub config: Option<serde_json::Value>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: Option<ActivityStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewParticipation {
    pub activity_id: ActivityId,
    pub user_id: String,
    pub game_name: String,
    pub game_target: String,
    pub state: UserState,
    pub award: AwardStatus,
    pub extra: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipationRecord {
    pub id: i64,
    pub activity_id: ActivityId,
    pub user_id: String,
    pub game_name: String,
    pub game_target: String,
    pub state: UserState,
    pub award: AwardStatus,
    pub extra: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrizeRecord {
    pub activity_id: ActivityId,
    pub user_id: String,
    pub game_name: String,
    pub grant: PrizeGrant,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrizeRecord {
    pub id: i64,
    pub activity_id: ActivityId,
    pub user_id: String,
    pub game_name: String,
    pub status: PrizeRecordStatus,
    pub grant: PrizeGrant,
    pub created_at: DateTime<Utc>,
}

/// 一次参与的工作单元
/// commit 之前的所有写入（库存、用户进度、记录）对其他请求不可见；
/// 未 commit 即被丢弃时全部回滚
#[async_trait]
pub trait Ledger: GameLedger {
    /// 在工作单元内读取活动并阻止其被并发修改，已归档的活动返回 None
    async fn activity_lock(&mut self, id: ActivityId) -> AppResult<Option<ActivityRecord>>;

    async fn participation_new(&mut self, data: NewParticipation)
    -> AppResult<ParticipationRecord>;

    async fn prize_record_new(&mut self, data: NewPrizeRecord) -> AppResult<PrizeRecord>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait ActivityRepo: Send + Sync {
    async fn activity_new(&self, data: NewActivity) -> AppResult<ActivityRecord>;

    /// 已归档的活动视为不存在
    async fn activity_try_load(&self, id: ActivityId) -> AppResult<Option<ActivityRecord>>;

    async fn activity_load(&self, id: ActivityId) -> AppResult<ActivityRecord> {
        self.activity_try_load(id)
            .await?
            .ok_or(AppError::ActivityNotFound)
    }

    async fn activity_update(&self, id: ActivityId, patch: ActivityPatch)
    -> AppResult<ActivityRecord>;

    async fn activity_archive(&self, id: ActivityId) -> AppResult<()>;

    async fn game_slots(&self, id: ActivityId) -> AppResult<Vec<GameSlot>>;

    async fn game_slot(&self, id: ActivityId, game_name: &str) -> AppResult<Option<GameSlot>> {
        Ok(self
            .game_slots(id)
            .await?
            .into_iter()
            .find(|slot| slot.game_name == game_name))
    }

    /// OPEN -> CLOSED，返回本次调用是否改变了状态
    async fn game_close(&self, id: ActivityId, game_name: &str) -> AppResult<bool>;

    async fn progress_load(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress>;

    /// 用户在该玩法下最近一次获得的奖品
    async fn prize_record_last(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<Option<PrizeRecord>>;

    /// 按时间倒序分页，返回 (当前页, 总数)
    async fn participation_select(
        &self,
        id: ActivityId,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<ParticipationRecord>, u64)>;

    async fn ledger_begin(&self) -> AppResult<Box<dyn Ledger>>;
}
