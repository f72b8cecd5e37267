use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "pipeline.log";
const DEFAULT_FILTER: &str = "permit_pipeline=info,warn";

/// Console output plus a daily-rolled JSON file under `logs/`. `RUST_LOG` overrides the filter.
pub fn init_logging() {
    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create {}: {}", LOG_DIR, e);
    }

    let (file_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    // flushes on drop; lives for the process
    std::mem::forget(guard);
}
