use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::rules::PrizeRecordStatus;

/// 奖品发放记录，每次成功发放一条
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prize_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activity_id: i64,
    pub user_id: String,
    pub game_name: String,
    pub prize_type: String,
    /// 折扣码或 SKU
    pub prize_id: String,
    pub status: PrizeRecordStatus,
    /// 发放时的完整奖品信息
    #[sea_orm(column_type = "JsonBinary")]
    pub extra: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
