//! 活动 / 玩法 / 奖品规则引擎

pub mod activity;
pub mod checkin;
pub mod community_post;
pub mod game;
pub mod prize;
pub mod registry;
pub mod state;

pub use activity::{Activity, ActivityConfig, ActivityDefinition, GameConfig};
pub use checkin::{CheckinConfig, CheckinGame};
pub use community_post::{CommunityPostConfig, CommunityPostGame};
pub use game::{
    ContentService, Game, GameAction, GameLedger, GameOutcome, GameRule, GameSlot, Play,
    PlayDetail, PlayEnv,
};
pub use prize::{Prize, PrizeAllocator, PrizeGrant, StockCounter, StockTake};
pub use registry::ActivityRegistry;
pub use state::*;
