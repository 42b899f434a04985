use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    ActivityPatch, ActivityRecord, ActivityRepo, Ledger, NewActivity, NewParticipation,
    NewPrizeRecord, ParticipationRecord, PrizeRecord,
};
use crate::error::{AppError, AppResult};
use crate::rules::{
    ActivityId, GameLedger, GameSlot, GameState, PrizeRecordStatus, StockCounter, StockTake,
    UserProgress,
};

type GameKey = (ActivityId, String);
type UserKey = (ActivityId, String, String);

#[derive(Debug, Clone, Default)]
struct Data {
    // None if activity was archived; id = index + 1
    activities: Vec<Option<ActivityRecord>>,
    games: HashMap<GameKey, GameSlot>,
    progress: HashMap<UserKey, UserProgress>,
    participations: Vec<ParticipationRecord>,
    prize_records: Vec<PrizeRecord>,
}

/// 非正数 id 没有对应的位置
fn activity_index(id: ActivityId) -> Option<usize> {
    id.checked_sub(1).and_then(|idx| usize::try_from(idx).ok())
}

impl Data {
    fn activity(&self, id: ActivityId) -> Option<&ActivityRecord> {
        activity_index(id)
            .and_then(|idx| self.activities.get(idx))
            .and_then(Option::as_ref)
    }

    fn activity_mut(&mut self, id: ActivityId) -> AppResult<&mut ActivityRecord> {
        activity_index(id)
            .and_then(|idx| self.activities.get_mut(idx))
            .and_then(Option::as_mut)
            .ok_or(AppError::ActivityNotFound)
    }
}

/// 进程内存储，单实例部署与测试使用
/// 所有写入通过同一把锁串行化
#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    conn: Arc<Mutex<Data>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityRepo for MemoryRepo {
    async fn activity_new(&self, data: NewActivity) -> AppResult<ActivityRecord> {
        let mut conn = self.conn.lock().await;
        let id = conn.activities.len() as ActivityId + 1;
        let now = Utc::now();
        let record = ActivityRecord {
            id,
            category: data.category,
            version: data.version,
            name: data.name,
            config: data.config,
            start_at: data.start_at,
            end_at: data.end_at,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        conn.activities.push(Some(record.clone()));
        for game in data.games {
            conn.games.insert(
                (id, game.game_name.clone()),
                GameSlot {
                    game_name: game.game_name,
                    state: game.state,
                    total_num: game.total_num,
                    remain_num: game.total_num,
                },
            );
        }
        Ok(record)
    }

    async fn activity_try_load(&self, id: ActivityId) -> AppResult<Option<ActivityRecord>> {
        let conn = self.conn.lock().await;
        Ok(conn.activity(id).cloned())
    }

    async fn activity_update(
        &self,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> AppResult<ActivityRecord> {
        let mut conn = self.conn.lock().await;
        let cur = conn.activity_mut(id)?;
        if let Some(name) = patch.name {
            cur.name = name;
        }
        if let Some(config) = patch.config {
            cur.config = config;
        }
        if let Some(start_at) = patch.start_at {
            cur.start_at = start_at;
        }
        if let Some(end_at) = patch.end_at {
            cur.end_at = end_at;
        }
        if let Some(status) = patch.status {
            cur.status = status;
        }
        cur.updated_at = Utc::now();
        Ok(cur.clone())
    }

    async fn activity_archive(&self, id: ActivityId) -> AppResult<()> {
        let mut conn = self.conn.lock().await;
        conn.activity_mut(id)?;
        if let Some(entry) = activity_index(id).and_then(|idx| conn.activities.get_mut(idx)) {
            *entry = None;
        }
        Ok(())
    }

    async fn game_slots(&self, id: ActivityId) -> AppResult<Vec<GameSlot>> {
        let conn = self.conn.lock().await;
        let mut slots: Vec<GameSlot> = conn
            .games
            .iter()
            .filter(|((activity_id, _), _)| *activity_id == id)
            .map(|(_, slot)| slot.clone())
            .collect();
        slots.sort_by(|a, b| a.game_name.cmp(&b.game_name));
        Ok(slots)
    }

    async fn game_close(&self, id: ActivityId, game_name: &str) -> AppResult<bool> {
        let mut conn = self.conn.lock().await;
        let slot = conn
            .games
            .get_mut(&(id, game_name.to_string()))
            .ok_or_else(|| AppError::GameNotFound(game_name.to_string()))?;
        let changed = slot.state == GameState::Open;
        slot.state = GameState::Closed;
        Ok(changed)
    }

    async fn progress_load(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress> {
        let conn = self.conn.lock().await;
        Ok(conn
            .progress
            .get(&(id, game_name.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn prize_record_last(
        &self,
        id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<Option<PrizeRecord>> {
        let conn = self.conn.lock().await;
        Ok(conn
            .prize_records
            .iter()
            .rev()
            .find(|r| r.activity_id == id && r.game_name == game_name && r.user_id == user_id)
            .cloned())
    }

    async fn participation_select(
        &self,
        id: ActivityId,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<ParticipationRecord>, u64)> {
        let conn = self.conn.lock().await;
        let matching: Vec<&ParticipationRecord> = conn
            .participations
            .iter()
            .rev()
            .filter(|p| p.activity_id == id && p.user_id == user_id)
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn ledger_begin(&self) -> AppResult<Box<dyn Ledger>> {
        let guard = self.conn.clone().lock_owned().await;
        Ok(Box::new(MemoryLedger {
            guard,
            writes: Writes::default(),
        }))
    }
}

/// 工作单元内的写入，commit 时才合并到存储
#[derive(Debug, Default)]
struct Writes {
    games: HashMap<GameKey, GameSlot>,
    progress: HashMap<UserKey, UserProgress>,
    participations: Vec<ParticipationRecord>,
    prize_records: Vec<PrizeRecord>,
}

/// 持有存储锁直到提交或丢弃，读取优先看本单元的写入
struct MemoryLedger {
    guard: OwnedMutexGuard<Data>,
    writes: Writes,
}

impl MemoryLedger {
    fn slot_mut(&mut self, key: GameKey) -> Option<&mut GameSlot> {
        if !self.writes.games.contains_key(&key) {
            let slot = self.guard.games.get(&key)?.clone();
            self.writes.games.insert(key.clone(), slot);
        }
        self.writes.games.get_mut(&key)
    }
}

#[async_trait]
impl StockCounter for MemoryLedger {
    async fn take_one(&mut self, activity_id: ActivityId, game_name: &str) -> AppResult<StockTake> {
        let slot = self
            .slot_mut((activity_id, game_name.to_string()))
            .ok_or_else(|| AppError::GameNotFound(game_name.to_string()))?;
        Ok(match slot.remain_num {
            None => StockTake::Unlimited,
            Some(remain) if remain <= 0 => StockTake::Empty,
            Some(remain) => {
                slot.remain_num = Some(remain - 1);
                StockTake::Taken { remain: remain - 1 }
            }
        })
    }
}

#[async_trait]
impl GameLedger for MemoryLedger {
    async fn game_slot(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
    ) -> AppResult<Option<GameSlot>> {
        let key = (activity_id, game_name.to_string());
        Ok(self
            .writes
            .games
            .get(&key)
            .or_else(|| self.guard.games.get(&key))
            .cloned())
    }

    async fn user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
    ) -> AppResult<UserProgress> {
        let key = (activity_id, game_name.to_string(), user_id.to_string());
        Ok(self
            .writes
            .progress
            .get(&key)
            .or_else(|| self.guard.progress.get(&key))
            .cloned()
            .unwrap_or_default())
    }

    async fn swap_user_progress(
        &mut self,
        activity_id: ActivityId,
        game_name: &str,
        user_id: &str,
        expected_version: i64,
        next: &UserProgress,
    ) -> AppResult<bool> {
        let key = (activity_id, game_name.to_string(), user_id.to_string());
        let current = self
            .writes
            .progress
            .get(&key)
            .or_else(|| self.guard.progress.get(&key))
            .map_or(0, |p| p.version);
        if current != expected_version {
            return Ok(false);
        }
        self.writes.progress.insert(
            key,
            UserProgress {
                version: expected_version + 1,
                ..next.clone()
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn activity_lock(&mut self, id: ActivityId) -> AppResult<Option<ActivityRecord>> {
        Ok(self.guard.activity(id).cloned())
    }

    async fn participation_new(
        &mut self,
        data: NewParticipation,
    ) -> AppResult<ParticipationRecord> {
        let id = self.guard.participations.len() + self.writes.participations.len() + 1;
        let record = ParticipationRecord {
            id: id as i64,
            activity_id: data.activity_id,
            user_id: data.user_id,
            game_name: data.game_name,
            game_target: data.game_target,
            state: data.state,
            award: data.award,
            extra: data.extra,
            created_at: data.created_at,
        };
        self.writes.participations.push(record.clone());
        Ok(record)
    }

    async fn prize_record_new(&mut self, data: NewPrizeRecord) -> AppResult<PrizeRecord> {
        let id = self.guard.prize_records.len() + self.writes.prize_records.len() + 1;
        let record = PrizeRecord {
            id: id as i64,
            activity_id: data.activity_id,
            user_id: data.user_id,
            game_name: data.game_name,
            status: PrizeRecordStatus::Granted,
            grant: data.grant,
            created_at: data.created_at,
        };
        self.writes.prize_records.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedger { mut guard, writes } = *self;
        guard.games.extend(writes.games);
        guard.progress.extend(writes.progress);
        guard.participations.extend(writes.participations);
        guard.prize_records.extend(writes.prize_records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::NewGame;
    use crate::rules::{ActivityStatus, PrizeGrant, UserState};
    use chrono::Duration;

    fn new_activity() -> NewActivity {
        let start = Utc::now();
        NewActivity {
            category: "community".into(),
            version: "v1".into(),
            name: "test".into(),
            config: serde_json::json!({}),
            start_at: start,
            end_at: start + Duration::days(1),
            status: ActivityStatus::Draft,
            games: vec![NewGame {
                game_name: "post".into(),
                game_type: "post".into(),
                state: GameState::Open,
                total_num: Some(1),
            }],
        }
    }

    #[tokio::test]
    async fn test_dropped_ledger_rolls_back() {
        let repo = MemoryRepo::new();
        let activity = repo.activity_new(new_activity()).await.unwrap();

        {
            let mut ledger = repo.ledger_begin().await.unwrap();
            let taken = ledger.take_one(activity.id, "post").await.unwrap();
            assert_eq!(taken, StockTake::Taken { remain: 0 });
        }
        let slot = repo.game_slot(activity.id, "post").await.unwrap().unwrap();
        assert_eq!(slot.remain_num, Some(1));

        let mut ledger = repo.ledger_begin().await.unwrap();
        ledger.take_one(activity.id, "post").await.unwrap();
        ledger.commit().await.unwrap();
        let slot = repo.game_slot(activity.id, "post").await.unwrap().unwrap();
        assert_eq!(slot.remain_num, Some(0));
    }

    #[tokio::test]
    async fn test_swap_requires_expected_version() {
        let repo = MemoryRepo::new();
        let mut ledger = repo.ledger_begin().await.unwrap();
        let next = UserProgress {
            state: UserState::Open,
            streak: 1,
            ..UserProgress::default()
        };
        assert!(ledger.swap_user_progress(1, "g", "u", 0, &next).await.unwrap());
        assert!(!ledger.swap_user_progress(1, "g", "u", 0, &next).await.unwrap());
        assert!(ledger.swap_user_progress(1, "g", "u", 1, &next).await.unwrap());
        ledger.commit().await.unwrap();

        let progress = repo.progress_load(1, "g", "u").await.unwrap();
        assert_eq!(progress.version, 2);
        assert_eq!(progress.streak, 1);
    }

    #[tokio::test]
    async fn test_archived_activity_is_gone() {
        let repo = MemoryRepo::new();
        let activity = repo.activity_new(new_activity()).await.unwrap();
        repo.activity_archive(activity.id).await.unwrap();
        assert!(repo.activity_try_load(activity.id).await.unwrap().is_none());
        assert!(matches!(
            repo.activity_load(activity.id).await,
            Err(AppError::ActivityNotFound)
        ));
        assert!(repo.activity_archive(activity.id).await.is_err());
    }

    #[tokio::test]
    async fn test_game_close_is_idempotent() {
        let repo = MemoryRepo::new();
        let activity = repo.activity_new(new_activity()).await.unwrap();
        assert!(repo.game_close(activity.id, "post").await.unwrap());
        assert!(!repo.game_close(activity.id, "post").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_ids_are_not_found() {
        let repo = MemoryRepo::new();
        repo.activity_new(new_activity()).await.unwrap();

        for id in [i64::MIN, -1, 0] {
            assert!(repo.activity_try_load(id).await.unwrap().is_none());
            assert!(matches!(
                repo.activity_update(id, ActivityPatch::default()).await,
                Err(AppError::ActivityNotFound)
            ));
            assert!(matches!(
                repo.activity_archive(id).await,
                Err(AppError::ActivityNotFound)
            ));
            let mut ledger = repo.ledger_begin().await.unwrap();
            assert!(ledger.activity_lock(id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_ledger_sees_its_own_writes_and_commits_only_them() {
        let repo = MemoryRepo::new();
        let activity = repo.activity_new(new_activity()).await.unwrap();

        let mut ledger = repo.ledger_begin().await.unwrap();
        ledger.take_one(activity.id, "post").await.unwrap();
        let slot = ledger.game_slot(activity.id, "post").await.unwrap().unwrap();
        assert_eq!(slot.remain_num, Some(0));
        assert_eq!(
            ledger.take_one(activity.id, "post").await.unwrap(),
            StockTake::Empty
        );
        let locked = ledger.activity_lock(activity.id).await.unwrap().unwrap();
        assert_eq!(locked.status, ActivityStatus::Draft);
        ledger.commit().await.unwrap();

        let mut ledger = repo.ledger_begin().await.unwrap();
        let record = ledger
            .prize_record_new(NewPrizeRecord {
                activity_id: activity.id,
                user_id: "u".into(),
                game_name: "post".into(),
                grant: PrizeGrant {
                    prize_type: "product_sku".into(),
                    prize_id: "SKU-1".into(),
                    price_rule_id: None,
                    title: None,
                    remain_num: None,
                },
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(record.id, 1);
        ledger.commit().await.unwrap();

        let slots = repo.game_slots(activity.id).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].remain_num, Some(0));
        assert_eq!(slots[0].total_num, Some(1));
        assert!(repo.prize_record_last(activity.id, "post", "u").await.unwrap().is_some());
    }
}
