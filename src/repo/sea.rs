use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection,
    DatabaseTransaction, EntityTrait, IntoActiveModel, NotSet, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{
    ActivityPatch, ActivityRecord, ActivityRepo, Ledger, NewActivity, NewParticipation,
    NewPrizeRecord, ParticipationRecord, PrizeRecord,
};
use crate::config::DatabaseConfig;
use crate::entities::{
    activity_entity as activities, activity_game_entity as games,
    participation_entity as participations, prize_record_entity as prize_records,
    user_game_state_entity as user_states,
};
use crate::error::{AppError, AppResult};
use crate::rules::{
    ActivityId, GameLedger, GameSlot, GameState, PrizeRecordStatus, StockCounter, StockTake,
    UserProgress,
};

/// 建立连接池并执行迁移
pub async fn connect(config: &DatabaseConfig) -> AppResult<DatabaseConnection> {
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

impl From<activities::Model> for ActivityRecord {
    fn from(m: activities::Model) -> Self {
        ActivityRecord {
            id: m.id,
            category: m.category,
            version: m.version,
            name: m.name,
            config: m.config,
            start_at: m.start_at,
            end_at: m.end_at,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<games::Model> for GameSlot {
    fn from(m: games::Model) -> Self {
        GameSlot {
            game_name: m.game_name,
            state: m.state,
            total_num: m.total_num,
            remain_num: m.remain_num,
        }
    }
}

impl From<participations::Model> for ParticipationRecord {
    fn from(m: participations::Model) -> Self {
        ParticipationRecord {
            id: m.id,
            activity_id: m.activity_id,
            user_id: m.user_id,
            game_name: m.game_name,
            game_target: m.game_target,
            state: m.state,
            award: m.award,
            extra: m.extra,
            created_at: m.created_at,
        }
    }
}

impl TryFrom<prize_records::Model> for PrizeRecord {
    type Error = AppError;

    fn try_from(m: prize_records::Model) -> AppResult<Self> {
        Ok(PrizeRecord {
            id: m.id,
            activity_id: m.activity_id,
            user_id: m.user_id,
            game_name: m.game_name,
            status: m.status,
            grant: serde_json::from_value(m.extra)?,
            created_at: m.created_at,
        })
    }
}

/// Postgres 存储
#[derive(Clone, Debug)]
pub struct SeaRepo {
    pool: DatabaseConnection,
}

impl SeaRepo {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_activity(&self, id: ActivityId) -> AppResult<Option<activities::Model>> {
        Ok(activities::Entity::find_by_id(id)
            .filter(activities::Column::DeletedAt.is_null())
            .one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ActivityRepo for SeaRepo {
    async fn activity_new(&self, data: NewActivity) -> AppResult<ActivityRecord> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let model = activities::ActiveModel {
            id: NotSet,
            category: Set(data.category),
            version: Set(data.version),
            name: Set(data.name),
            config: Set(data.config),
            start_at: Set(data.start_at),
            end_at: Set(data.end_at),
            status: Set(data.status),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        if !data.games.is_empty() {
            let rows = data.games.into_iter().map(|g| games::ActiveModel {
                id: NotSet,
                activity_id: Set(model.id),
                game_name: Set(g.game_name),
                game_type: Set(g.game_type),
                state: Set(g.state),
                total_num: Set(g.total_num),
                remain_num: Set(g.total_num),
                updated_at: Set(now),
            });
            games::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(model.into())
    }

    async fn activity_try_load(&self, id: ActivityId) -> AppResult<Option<ActivityRecord>> {
        Ok(self.find_activity(id).await?.map(Into::into))
    }

    async fn activity_update(
        &self,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> AppResult<ActivityRecord> {
        let current = self
            .find_activity(id)
            .await?
            .ok_or(AppError::ActivityNotFound)?;

        let mut am = current.into_active_model();
        if let Some(name) = patch.name {
            am.name = Set(name);
        }
        if let Some(config) = patch.config {
            am.config = Set(config);
        }
        if let Some(start_at) = patch.start_at {
            am.start_at = Set(start_at);
        }
        if let Some(end_at) = patch.end_at {
            am.end_at = Set(end_at);
        }
        if let Some(status) = patch.status {
            am.status = Set(status);
        }
        am.updated_at = Set(Utc::now());

        Ok(am.update(&self.pool).await?.into())
    }

    async fn activity_archive(&self, id: ActivityId) -> AppResult<()> {
        let now = Utc::now();
        let result = activities::Entity::update_many()
            .col_expr(activities::Column::DeletedAt, Expr::value(now))
            .col_expr(activities::Column::UpdatedAt, Expr::value(now))
            .filter(activities::Column::Id.eq(id))
            .filter(activities::Column::DeletedAt.is_null())
            .exec(&self.pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::ActivityNotFound);
        }
        Ok(())
    }

    async fn game_slots(&self, id: ActivityId) -> AppResult<Vec<GameSlot>> {
        let list = games::Entity::find()
            .filter(games::Column::ActivityId.eq(id))
            .order_by_asc(games::Column::GameName)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn game_close(&self, id: ActivityId, game_name: &str) -> AppResult<bool> {
        let result = games::Entity::update_many()
            .col_expr(games::Column::State, Expr::value(GameState::Closed.to_value()))
            .col_expr(games::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(games::Column::ActivityId.eq(id))
            .filter(games::Column::GameName.eq(game_name))
            .filter(games::Column::State.eq(GameState::Open))
            .exec(&self.pool)
            .await?;
        if result.rows_affected > 0 {
            return Ok(true);
        }

        // 未更新：已关闭或不存在
        let exists = games::Entity::find()
            .filter(games::Column::ActivityId.eq(id))
            .filter(games::Column::GameName.eq(game_name))
            .count(&self.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::GameNotFound(game_name.to_string()));
        }
        Ok(false)
    }

    async fn progress_load(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress> {
        load_progress(&self.pool, id, game_name, user_id).await
    }

    async fn prize_record_last(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<Option<PrizeRecord>> {
        prize_records::Entity::find()
            .filter(prize_records::Column::ActivityId.eq(id))
            .filter(prize_records::Column::GameName.eq(game_name))
            .filter(prize_records::Column::UserId.eq(user_id))
            .order_by_desc(prize_records::Column::Id)
            .one(&self.pool)
            .await?
            .map(PrizeRecord::try_from)
            .transpose()
    }

    async fn participation_select(
        &self,
        id: ActivityId,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<ParticipationRecord>, u64)> {
        let base_query = participations::Entity::find()
            .filter(participations::Column::ActivityId.eq(id))
            .filter(participations::Column::UserId.eq(user_id));

        let total = base_query.clone().count(&self.pool).await?;

        let items = base_query
            .order_by_desc(participations::Column::CreatedAt)
            .order_by_desc(participations::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.pool)
            .await?;

        Ok((items.into_iter().map(Into::into).collect(), total))
    }

    async fn ledger_begin(&self) -> AppResult<Box<dyn Ledger>> {
        let txn = self.pool.begin().await?;
        Ok(Box::new(SeaLedger { txn }))
    }
}

async fn load_progress<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: ActivityId,
    game_name: &str,
    user_id: &str,
) -> AppResult<UserProgress> {
    Ok(user_states::Entity::find()
        .filter(user_states::Column::ActivityId.eq(id))
        .filter(user_states::Column::GameName.eq(game_name))
        .filter(user_states::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .map(Into::into)
        .unwrap_or_default())
}

/// 数据库事务上的工作单元，丢弃即回滚
struct SeaLedger {
    txn: DatabaseTransaction,
}

#[async_trait]
impl StockCounter for SeaLedger {
    async fn take_one(&mut self, activity_id: ActivityId, game_name: &str) -> AppResult<StockTake> {
        let slot = games::Entity::find()
            .filter(games::Column::ActivityId.eq(activity_id))
            .filter(games::Column::GameName.eq(game_name))
            .one(&self.txn)
            .await?
            .ok_or_else(|| AppError::GameNotFound(game_name.to_string()))?;

        if slot.remain_num.is_none() {
            return Ok(StockTake::Unlimited);
        }

        // 条件扣减：并发事务在行锁上排队，提交后重新判断 remain_num > 0
        let result = games::Entity::update_many()
            .col_expr(
                games::Column::RemainNum,
                Expr::col(games::Column::RemainNum).sub(1),
            )
            .col_expr(games::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(games::Column::Id.eq(slot.id))
            .filter(games::Column::RemainNum.gt(0))
            .exec(&self.txn)
            .await?;

        if result.rows_affected == 0 {
            return Ok(StockTake::Empty);
        }

        let remain = games::Entity::find_by_id(slot.id)
            .one(&self.txn)
            .await?
            .and_then(|m| m.remain_num)
            .ok_or_else(|| {
                AppError::InternalError(format!("game {game_name} disappeared after stock update"))
            })?;
        Ok(StockTake::Taken { remain })
    }
}

#[async_trait]
impl GameLedger for SeaLedger {
    async fn game_slot(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
    ) -> AppResult<Option<GameSlot>> {
        Ok(games::Entity::find()
            .filter(games::Column::ActivityId.eq(activity_id))
            .filter(games::Column::GameName.eq(game_name))
            .one(&self.txn)
            .await?
            .map(Into::into))
    }

    async fn user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress> {
        load_progress(&self.txn, activity_id, game_name, user_id).await
    }

    async fn swap_user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
        expected_version: i64,
        next: &UserProgress,
    ) -> AppResult<bool> {
        let now = Utc::now();

        if expected_version == 0 {
            // 首次写入：唯一约束冲突说明其他请求已抢先
            let row = user_states::ActiveModel {
                id: NotSet,
                activity_id: Set(activity_id),
                game_name: Set(game_name.to_string()),
                user_id: Set(user_id.to_string()),
                state: Set(next.state),
                streak: Set(next.streak),
                last_checkin_on: Set(next.last_checkin_on),
                version: Set(1),
                updated_at: Set(now),
            };
            let inserted = user_states::Entity::insert(row)
                .on_conflict(
                    OnConflict::columns([
                        user_states::Column::ActivityId,
                        user_states::Column::GameName,
                        user_states::Column::UserId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&self.txn)
                .await?;
            return Ok(inserted == 1);
        }

        let result = user_states::Entity::update_many()
            .set(user_states::ActiveModel {
                state: Set(next.state),
                streak: Set(next.streak),
                last_checkin_on: Set(next.last_checkin_on),
                version: Set(expected_version + 1),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(user_states::Column::ActivityId.eq(activity_id))
            .filter(user_states::Column::GameName.eq(game_name))
            .filter(user_states::Column::UserId.eq(user_id))
            .filter(user_states::Column::Version.eq(expected_version))
            .exec(&self.txn)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl Ledger for SeaLedger {
    async fn activity_lock(&mut self, id: ActivityId) -> AppResult<Option<ActivityRecord>> {
        // 共享锁：下线、归档、修改时间窗需等待本事务结束
        Ok(activities::Entity::find_by_id(id)
            .filter(activities::Column::DeletedAt.is_null())
            .lock_shared()
            .one(&self.txn)
            .await?
            .map(Into::into))
    }

    async fn participation_new(
        &mut self,
        data: NewParticipation,
    ) -> AppResult<ParticipationRecord> {
        let model = participations::ActiveModel {
            id: NotSet,
            activity_id: Set(data.activity_id),
            user_id: Set(data.user_id),
            game_name: Set(data.game_name),
            game_target: Set(data.game_target),
            state: Set(data.state),
            award: Set(data.award),
            extra: Set(data.extra),
            created_at: Set(data.created_at),
        }
        .insert(&self.txn)
        .await?;
        Ok(model.into())
    }

    async fn prize_record_new(&mut self, data: NewPrizeRecord) -> AppResult<PrizeRecord> {
        let model = prize_records::ActiveModel {
            id: NotSet,
            activity_id: Set(data.activity_id),
            user_id: Set(data.user_id),
            game_name: Set(data.game_name),
            prize_type: Set(data.grant.prize_type.clone()),
            prize_id: Set(data.grant.prize_id.clone()),
            status: Set(PrizeRecordStatus::Granted),
            extra: Set(serde_json::to_value(&data.grant)?),
            created_at: Set(data.created_at),
            updated_at: Set(data.created_at),
        }
        .insert(&self.txn)
        .await?;
        PrizeRecord::try_from(model)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.txn.commit().await?;
        Ok(())
    }
}
