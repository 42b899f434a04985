pub mod activity_service;
pub mod participation_service;

pub use activity_service::*;
pub use participation_service::*;
