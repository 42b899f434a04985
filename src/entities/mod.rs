pub mod activities;
pub mod activity_games;
pub mod activity_participations;
pub mod prize_records;
pub mod user_game_states;

pub use activities as activity_entity;
pub use activity_games as activity_game_entity;
pub use activity_participations as participation_entity;
pub use prize_records as prize_record_entity;
pub use user_game_states as user_game_state_entity;
