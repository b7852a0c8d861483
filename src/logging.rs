use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the global subscriber: a stdout layer filtered by the configured
/// level, plus a daily-rotated file layer when a log directory is configured.
/// The returned guard must outlive the process for file logs to flush.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry().with(filter).with(stdout);

    let Some(dir) = &config.log_dir else {
        registry.init();
        return None;
    };

    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "progress.log"));
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        Err(err) => {
            registry.init();
            tracing::warn!(dir, %err, "log directory unavailable, file logging disabled");
            None
        }
    }
}
