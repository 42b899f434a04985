pub mod activity;
pub mod common;
pub mod game;
pub mod pagination;

pub use activity::*;
pub use common::*;
pub use game::*;
pub use pagination::*;
