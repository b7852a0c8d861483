#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    /// Directory for rotated log files; `None` keeps logging on stdout only.
    pub log_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:kotoba.db?mode=rwc".to_string());

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_dir = std::env::var("LOG_DIR").ok().filter(|dir| !dir.is_empty());

        Self {
            database_url,
            log_level,
            log_dir,
        }
    }
}
