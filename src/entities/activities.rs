use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::rules::ActivityStatus;

/// 活动实体
/// - config: 完整的活动配置文档 (jsonb)，玩法定义以此为准
/// - name / start_at / end_at / status: 管理端可直接修改的列
/// - deleted_at: 软删除标记，非空即视为不存在
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub category: String,
    pub version: String,
    pub name: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub config: Json,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ActivityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity_games::Entity")]
    ActivityGames,
}

impl Related<super::activity_games::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityGames.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
