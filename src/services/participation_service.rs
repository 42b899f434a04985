use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    GameStatusView, PaginatedResponse, PaginationParams, ParticipateRequest, ParticipationResult,
    ParticipationView, PrizeView,
};
use crate::repo::{ActivityRepo, NewParticipation, NewPrizeRecord};
use crate::rules::{
    Activity, ActivityId, ActivityStatus, AwardStatus, ContentService, Game, GameAction,
    GameState, LifecycleStatus, PlayEnv, User, UserState,
};
use crate::services::ActivityService;

/// 引擎时钟，签到日与活动时间窗都以它为准
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 参与引擎
#[derive(Clone)]
pub struct ParticipationService {
    activities: ActivityService,
    repo: Arc<dyn ActivityRepo>,
    content: Arc<dyn ContentService>,
    clock: Arc<dyn Clock>,
    prepare_timeout: Duration,
}

impl ParticipationService {
    pub fn new(
        activities: ActivityService,
        repo: Arc<dyn ActivityRepo>,
        content: Arc<dyn ContentService>,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            activities,
            repo,
            content,
            clock: Arc::new(SystemClock),
            prepare_timeout: Duration::from_millis(engine.prepare_timeout_ms),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 参与玩法
    ///
    /// 逻辑:
    /// 1. 加载活动 (DRAFT / 已归档 -> ActivityNotFound)
    /// 2. 校验活动时间窗
    /// 3. 查找玩法
    /// 4. 玩法的外部校验（如帖子归属），在工作单元之外执行
    /// 5. 在同一个工作单元中复查活动状态并执行玩法（状态检查、用户进度 CAS、抽奖、扣库存）
    /// 6. 写参与记录与奖品记录后提交
    ///
    /// 1-3 无副作用，受取消信号与超时约束；4-6 在独立任务中执行，调用方放弃等待也不会中断
    /// 库存已空时参与仍会被记录，但返回 StockEmpty
    pub async fn participate_in_game(
        &self,
        user: &User,
        req: &ParticipateRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ParticipationResult> {
        let now = self.clock.now();
        let game = self.prepare(req, now, cancel).await?;

        let repo = self.repo.clone();
        let content = self.content.clone();
        let user = user.clone();
        let action = req.action();
        let activity_id = req.activity_id;
        let result = tokio::spawn(async move {
            perform_and_record(repo, content, activity_id, game, user, action, now).await
        })
        .await??;

        if result.award == AwardStatus::StockEmpty {
            return Err(AppError::StockEmpty);
        }
        Ok(result)
    }

    async fn prepare(
        &self,
        req: &ParticipateRequest,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> AppResult<Game> {
        let load = async {
            let activity = self.activities.load(req.activity_id).await?;
            activity.ensure_participable(now)?;
            activity.resolve_game(&req.game_name).cloned()
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!(
                    "Participation cancelled before mutation: activity={} game={}",
                    req.activity_id,
                    req.game_name
                );
                Err(AppError::RequestCancelled)
            }
            res = tokio::time::timeout(self.prepare_timeout, load) => match res {
                Ok(game) => game,
                Err(_) => {
                    log::warn!(
                        "Participation prepare timed out after {:?}: activity={} game={}",
                        self.prepare_timeout,
                        req.activity_id,
                        req.game_name
                    );
                    Err(AppError::RequestCancelled)
                }
            },
        }
    }

    /// 用户侧可见的活动（ONLINE 且未归档）
    async fn load_visible(&self, id: ActivityId) -> AppResult<Activity> {
        let activity = self.activities.load(id).await?;
        if activity.status != ActivityStatus::Online {
            return Err(AppError::ActivityNotFound);
        }
        Ok(activity)
    }

    /// 玩法状态视图，只读
    pub async fn get_game_status(
        &self,
        user: &User,
        activity_id: ActivityId,
        game_name: &str,
    ) -> AppResult<GameStatusView> {
        let now = self.clock.now();
        let activity = self.load_visible(activity_id).await?;
        let game = activity.resolve_game(game_name)?;
        let lifecycle = activity.lifecycle(now);

        let slot = self.repo.game_slot(activity_id, game_name).await?;
        let game_state = match lifecycle {
            LifecycleStatus::Ended => GameState::Closed,
            _ => game.game_state(slot.as_ref()),
        };

        let progress = self
            .repo
            .progress_load(activity_id, game_name, &user.uid)
            .await?;
        // 用户状态只在玩法开放时有意义
        let user_state = match game_state {
            GameState::Open => game.user_state(&progress),
            GameState::Closed => UserState::Unknown,
        };

        let (checkin_days, required_days) = match game {
            Game::CheckinStreak(g) => (Some(progress.streak), Some(g.required_days())),
            Game::CommunityPost(_) => (None, None),
        };

        Ok(GameStatusView {
            activity_id,
            game_name: game.name().to_string(),
            game_type: game.game_type().to_string(),
            activity_status: lifecycle,
            start_at: activity.definition.start_at,
            end_at: activity.definition.end_at,
            game_state,
            user_state,
            total_num: slot.as_ref().and_then(|s| s.total_num),
            remain_num: slot.as_ref().and_then(|s| s.remain_num),
            checkin_days,
            required_days,
        })
    }

    /// 用户在该玩法下获得的奖品，没有则为 None
    pub async fn get_user_prize(
        &self,
        user: &User,
        activity_id: ActivityId,
        game_name: &str,
    ) -> AppResult<Option<PrizeView>> {
        let activity = self.load_visible(activity_id).await?;
        activity.resolve_game(game_name)?;

        Ok(self
            .repo
            .prize_record_last(activity_id, game_name, &user.uid)
            .await?
            .map(Into::into))
    }

    /// 分页获取用户在活动中的参与记录（倒序）
    pub async fn list_participations(
        &self,
        user: &User,
        activity_id: ActivityId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ParticipationView>> {
        self.load_visible(activity_id).await?;

        let (items, total) = self
            .repo
            .participation_select(
                activity_id,
                &user.uid,
                params.get_offset(),
                params.get_limit(),
            )
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params,
            total,
        ))
    }
}

/// 在一个工作单元内执行玩法并写记录，任何失败都不会提交
async fn perform_and_record(
    repo: Arc<dyn ActivityRepo>,
    content: Arc<dyn ContentService>,
    activity_id: ActivityId,
    game: Game,
    user: User,
    action: GameAction,
    now: DateTime<Utc>,
) -> AppResult<ParticipationResult> {
    game.verify(content.as_ref(), &user, &action).await?;

    let mut ledger = repo.ledger_begin().await?;

    // 准备阶段之后活动可能已被下线、归档或修改时间窗
    let activity = ledger
        .activity_lock(activity_id)
        .await?
        .ok_or(AppError::ActivityNotFound)?;
    if activity.status != ActivityStatus::Online {
        return Err(AppError::ActivityNotFound);
    }
    if now < activity.start_at {
        return Err(AppError::ActivityNotStarted);
    }
    if now >= activity.end_at {
        return Err(AppError::ActivityEnded);
    }
    let env = PlayEnv {
        now,
        start_at: activity.start_at,
        end_at: activity.end_at,
    };

    let outcome = game
        .perform(ledger.as_mut(), &env, activity_id, &user, &action)
        .await?;

    let record = ledger
        .participation_new(NewParticipation {
            activity_id,
            user_id: user.uid.clone(),
            game_name: outcome.game_name.clone(),
            game_target: outcome.target.clone(),
            state: outcome.user_state,
            award: outcome.award,
            extra: serde_json::to_value(&outcome.detail)?,
            created_at: now,
        })
        .await?;

    if let Some(grant) = &outcome.grant {
        ledger
            .prize_record_new(NewPrizeRecord {
                activity_id,
                user_id: user.uid.clone(),
                game_name: outcome.game_name.clone(),
                grant: grant.clone(),
                created_at: now,
            })
            .await?;
    }

    if let Err(e) = ledger.commit().await {
        log::error!(
            "Participation commit failed after rules succeeded: activity={} game={} user={} award={:?}: {}",
            activity_id,
            outcome.game_name,
            user.uid,
            outcome.award,
            e
        );
        return Err(e);
    }

    log::info!(
        "Participation recorded: activity={} game={} user={} state={:?} award={:?}",
        activity_id,
        outcome.game_name,
        user.uid,
        outcome.user_state,
        outcome.award
    );

    Ok(ParticipationResult {
        participation_id: record.id,
        activity_id,
        game_name: outcome.game_name,
        game_type: outcome.game_type,
        target: outcome.target,
        user_state: outcome.user_state,
        award: outcome.award,
        prize: outcome.grant,
        detail: outcome.detail,
        created_at: record.created_at,
    })
}
