pub mod league;
pub mod profile;
pub mod scheduler;
pub mod session;
pub mod settlement;
pub mod streak;
