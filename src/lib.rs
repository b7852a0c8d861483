pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod services;

pub use db::Database;
pub use models::{League, Profile, ProgressRecord, WeeklyLedger};
pub use services::session::{SessionError, SessionSettlement, SessionState};
