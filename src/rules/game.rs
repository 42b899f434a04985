use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checkin::CheckinGame;
use super::community_post::CommunityPostGame;
use super::prize::{Prize, PrizeAllocator, PrizeGrant, StockCounter};
use super::state::{ActivityId, AwardStatus, GameState, User, UserProgress, UserState};
use crate::error::{AppError, AppResult};

/// 社区内容服务能力：校验帖子存在且属于该用户
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn post_exists(&self, user: &User, post_id: &str) -> AppResult<bool>;
}

/// 用户请求携带的动作，不同玩法读取各自需要的字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin_at: Option<DateTime<Utc>>,
}

impl GameAction {
    pub fn post(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            checkin_at: None,
        }
    }

    pub fn checkin(at: DateTime<Utc>) -> Self {
        Self {
            post_id: None,
            checkin_at: Some(at),
        }
    }
}

/// 玩法规则执行时的上下文：引擎时钟与活动时间窗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayEnv {
    pub now: DateTime<Utc>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// 玩法特有的结果信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game_type", rename_all = "snake_case")]
pub enum PlayDetail {
    Post {
        post_id: String,
    },
    Checkin {
        checkin_days: i64,
        required_days: i64,
    },
}

/// 规则计算出的一步推进：下一个用户进度以及是否满足领奖条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    pub target: String,
    pub next: UserProgress,
    pub qualifies: bool,
    pub detail: PlayDetail,
}

/// 各玩法的统一能力接口
#[async_trait]
pub trait GameRule: Send + Sync {
    /// 同一活动内唯一
    fn name(&self) -> &str;
    fn game_type(&self) -> &'static str;
    /// 配置中的玩法状态
    fn configured_state(&self) -> GameState;
    fn prize(&self) -> Option<&Prize>;
    fn validate_config(&self) -> AppResult<()>;

    fn user_state(&self, progress: &UserProgress) -> UserState {
        progress.state
    }

    /// 校验依赖外部服务的前置条件（如帖子归属），在工作单元开启前执行
    async fn verify(
        &self,
        _content: &dyn ContentService,
        _user: &User,
        _action: &GameAction,
    ) -> AppResult<()> {
        Ok(())
    }

    /// 计算一次参与的结果，不做任何持久化与外部调用
    fn play(&self, env: &PlayEnv, progress: &UserProgress, action: &GameAction)
    -> AppResult<Play>;

    /// 序列化回配置文档中的 config 字段
    fn config_value(&self) -> serde_json::Value;
}

/// 玩法持久化状态（运营状态 + 库存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSlot {
    pub game_name: String,
    pub state: GameState,
    pub total_num: Option<i64>,
    pub remain_num: Option<i64>,
}

/// 一次参与的工作单元中，玩法需要的存储能力
#[async_trait]
pub trait GameLedger: StockCounter {
    async fn game_slot(&mut self, activity_id: ActivityId, game_name: &str)
    -> AppResult<Option<GameSlot>>;

    async fn user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress>;

    /// 当且仅当当前 version 等于 expected_version 时写入 next，返回是否成功
    async fn swap_user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
        expected_version: i64,
        next: &UserProgress,
    ) -> AppResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub game_name: String,
    pub game_type: String,
    pub target: String,
    pub user_state: UserState,
    pub award: AwardStatus,
    pub grant: Option<PrizeGrant>,
    pub detail: PlayDetail,
}

/// 可插拔玩法的封闭集合
#[derive(Debug, Clone, PartialEq)]
pub enum Game {
    CommunityPost(CommunityPostGame),
    CheckinStreak(CheckinGame),
}

impl Game {
    pub fn rule(&self) -> &dyn GameRule {
        match self {
            Game::CommunityPost(g) => g,
            Game::CheckinStreak(g) => g,
        }
    }

    pub fn name(&self) -> &str {
        self.rule().name()
    }

    pub fn game_type(&self) -> &'static str {
        self.rule().game_type()
    }

    pub fn prize(&self) -> Option<&Prize> {
        self.rule().prize()
    }

    pub fn validate_config(&self) -> AppResult<()> {
        self.rule().validate_config()
    }

    /// 配置状态与持久化状态合并，CLOSED 优先
    pub fn game_state(&self, slot: Option<&GameSlot>) -> GameState {
        let configured = self.rule().configured_state();
        match slot {
            Some(slot) => configured.merge(slot.state),
            None => configured,
        }
    }

    pub fn user_state(&self, progress: &UserProgress) -> UserState {
        self.rule().user_state(progress)
    }

    pub async fn verify(
        &self,
        content: &dyn ContentService,
        user: &User,
        action: &GameAction,
    ) -> AppResult<()> {
        self.rule().verify(content, user, action).await
    }

    /// 执行玩法：
    /// 1. 玩法状态必须 OPEN，否则 GameClosed
    /// 2. 用户状态必须可参与，否则 UserCannotParticipate
    /// 3. 规则计算下一步进度
    /// 4. CAS 写入用户进度，竞争失败视为 UserCannotParticipate
    /// 5. 满足条件时按概率抽奖并通过分配器扣减库存
    ///
    /// 任一步失败时调用方必须丢弃整个工作单元
    pub async fn perform<L>(
        &self,
        ledger: &mut L,
        env: &PlayEnv,
        activity_id: ActivityId,
        user: &User,
        action: &GameAction,
    ) -> AppResult<GameOutcome>
    where
        L: GameLedger + ?Sized,
    {
        let rule = self.rule();
        let name = rule.name();

        let slot = ledger.game_slot(activity_id, name).await?;
        if self.game_state(slot.as_ref()) != GameState::Open {
            return Err(AppError::GameClosed);
        }

        let progress = ledger.user_progress(activity_id, name, &user.uid).await?;
        if !rule.user_state(&progress).can_participate() {
            return Err(AppError::UserCannotParticipate);
        }

        let play = rule.play(env, &progress, action)?;

        let swapped = ledger
            .swap_user_progress(activity_id, name, &user.uid, progress.version, &play.next)
            .await?;
        if !swapped {
            log::warn!(
                "Concurrent participation lost user state race: activity={} game={} user={}",
                activity_id,
                name,
                user.uid
            );
            return Err(AppError::UserCannotParticipate);
        }

        let (award, grant) = match rule.prize() {
            _ if !play.qualifies => (AwardStatus::Progressed, None),
            Some(prize) if !prize.draw() => (AwardStatus::NotDrawn, None),
            prize => {
                // 库存耗尽时本次参与仍然有效，只是没有奖品
                let allocator = PrizeAllocator::new(activity_id, name, prize);
                match allocator.award(ledger, user).await {
                    Ok(grant) => (AwardStatus::Awarded, Some(grant)),
                    Err(AppError::StockEmpty) => (AwardStatus::StockEmpty, None),
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(GameOutcome {
            game_name: name.to_string(),
            game_type: rule.game_type().to_string(),
            target: play.target,
            user_state: play.next.state,
            award,
            grant,
            detail: play.detail,
        })
    }
}
