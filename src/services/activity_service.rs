use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{ActivitySnapshot, GameSnapshot, UpdateActivityRequest};
use crate::repo::{ActivityPatch, ActivityRecord, ActivityRepo, NewActivity, NewGame};
use crate::rules::{
    Activity, ActivityConfig, ActivityId, ActivityRegistry, ActivityStatus, GameState,
    LifecycleStatus,
};

#[derive(Clone)]
pub struct ActivityService {
    repo: Arc<dyn ActivityRepo>,
    registry: Arc<ActivityRegistry>,
}

impl ActivityService {
    pub fn new(repo: Arc<dyn ActivityRepo>, registry: Arc<ActivityRegistry>) -> Self {
        Self { repo, registry }
    }

    /// 创建活动
    /// 1. 通过注册表解析并整体校验配置
    /// 2. 以 DRAFT 状态保存，并为每个玩法初始化库存
    pub async fn create_activity(&self, raw: &serde_json::Value) -> AppResult<ActivitySnapshot> {
        let definition = self.registry.parse_value(raw)?;
        let config = serde_json::to_value(definition.to_config())?;

        let games = definition
            .games
            .iter()
            .map(|game| NewGame {
                game_name: game.name().to_string(),
                game_type: game.game_type().to_string(),
                state: game.game_state(None),
                total_num: game.prize().and_then(|p| p.total_num()),
            })
            .collect();

        let record = self
            .repo
            .activity_new(NewActivity {
                category: definition.category.clone(),
                version: definition.version.clone(),
                name: definition.name.clone(),
                config,
                start_at: definition.start_at,
                end_at: definition.end_at,
                status: ActivityStatus::Draft,
                games,
            })
            .await?;

        log::info!(
            "Activity created: id={} category={} version={} games={}",
            record.id,
            record.category,
            record.version,
            definition.games.len()
        );
        self.snapshot(record, Utc::now()).await
    }

    /// 加载活动定义（含 DRAFT），已归档的返回 ActivityNotFound
    pub async fn load(&self, id: ActivityId) -> AppResult<Activity> {
        let record = self.repo.activity_load(id).await?;
        self.build(&record)
    }

    fn build(&self, record: &ActivityRecord) -> AppResult<Activity> {
        // 列上的名称与时间窗可被单独修改，以列为准
        let mut config = ActivityConfig::from_value(&record.config)?;
        config.name = record.name.clone();
        config.start_at = record.start_at;
        config.end_at = record.end_at;

        Ok(Activity {
            id: record.id,
            status: record.status,
            definition: self.registry.build(&config)?,
        })
    }

    pub async fn get_activity(&self, id: ActivityId) -> AppResult<ActivitySnapshot> {
        let record = self.repo.activity_load(id).await?;
        self.snapshot(record, Utc::now()).await
    }

    /// DRAFT -> ONLINE
    pub async fn publish_activity(&self, id: ActivityId) -> AppResult<ActivitySnapshot> {
        let activity = self.load(id).await?;
        if activity.status == ActivityStatus::Online {
            return self.get_activity(id).await;
        }

        let record = self
            .repo
            .activity_update(
                id,
                ActivityPatch {
                    status: Some(ActivityStatus::Online),
                    ..Default::default()
                },
            )
            .await?;
        log::info!("Activity published: id={}", id);
        self.snapshot(record, Utc::now()).await
    }

    pub async fn update_activity(
        &self,
        id: ActivityId,
        req: UpdateActivityRequest,
    ) -> AppResult<ActivitySnapshot> {
        let activity = self.load(id).await?;

        let mut config = activity.definition.to_config();
        if let Some(name) = &req.name {
            config.name = name.trim().to_string();
        }
        if let Some(start_at) = req.start_at {
            config.start_at = start_at;
        }
        if let Some(end_at) = req.end_at {
            config.end_at = end_at;
        }
        // 重新走一遍完整校验（含 start < end）
        let definition = self.registry.build(&config)?;

        let record = self
            .repo
            .activity_update(
                id,
                ActivityPatch {
                    name: req.name.map(|_| definition.name.clone()),
                    config: Some(serde_json::to_value(definition.to_config())?),
                    start_at: req.start_at,
                    end_at: req.end_at,
                    status: req.status,
                },
            )
            .await?;
        log::info!("Activity updated: id={}", id);
        self.snapshot(record, Utc::now()).await
    }

    /// 软删除
    pub async fn archive_activity(&self, id: ActivityId) -> AppResult<()> {
        self.repo.activity_archive(id).await?;
        log::info!("Activity archived: id={}", id);
        Ok(())
    }

    /// 管理端关闭玩法，单调且幂等
    pub async fn close_game(&self, id: ActivityId, game_name: &str) -> AppResult<ActivitySnapshot> {
        let activity = self.load(id).await?;
        activity.resolve_game(game_name)?;

        if self.repo.game_close(id, game_name).await? {
            log::info!("Game closed by admin: activity={} game={}", id, game_name);
        }
        self.get_activity(id).await
    }

    async fn snapshot(
        &self,
        record: ActivityRecord,
        now: DateTime<Utc>,
    ) -> AppResult<ActivitySnapshot> {
        let activity = self.build(&record)?;
        let slots = self.repo.game_slots(record.id).await?;
        let lifecycle = activity.lifecycle(now);

        let games = activity
            .definition
            .games
            .iter()
            .map(|game| {
                let slot = slots.iter().find(|s| s.game_name == game.name());
                let state = match lifecycle {
                    LifecycleStatus::Ended => GameState::Closed,
                    _ => game.game_state(slot),
                };
                GameSnapshot {
                    name: game.name().to_string(),
                    game_type: game.game_type().to_string(),
                    state,
                    total_num: slot.and_then(|s| s.total_num),
                    remain_num: slot.and_then(|s| s.remain_num),
                    config: game.rule().config_value(),
                }
            })
            .collect();

        Ok(ActivitySnapshot {
            id: record.id,
            category: record.category,
            version: record.version,
            name: record.name,
            status: record.status,
            lifecycle,
            start_at: record.start_at,
            end_at: record.end_at,
            games,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
