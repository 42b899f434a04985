use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::rules::{UserProgress, UserState};

/// 用户在玩法下的进度
/// (activity_id, game_name, user_id) 唯一，version 每次写入加一
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_game_states")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub activity_id: i64,
    pub game_name: String,
    pub user_id: String,
    pub state: UserState,
    pub streak: i64,
    pub last_checkin_on: Option<NaiveDate>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Model> for UserProgress {
    fn from(m: Model) -> Self {
        UserProgress {
            state: m.state,
            streak: m.streak,
            last_checkin_on: m.last_checkin_on,
            version: m.version,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
