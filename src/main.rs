//! aac-transcode
//!
//! Runs one transcode job described by a TOML file: raw PCM to an ADTS
//! stream, or an ADTS stream back to raw PCM. Prints the pipeline counters
//! as JSON when done.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aac_transcode::config_file::{ConfigFile, LoggingSettings};
use aac_transcode::runner::run_job;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "aac-transcode";

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let job = match ConfigFile::from_file(&config_path).and_then(ConfigFile::into_job) {
        Ok(job) => job,
        Err(e) => {
            init_logging(&LoggingSettings::default());
            tracing::error!("Failed to load config file {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&job.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("Job loaded: {:?}", job);

    match run_job(&job) {
        Ok(stats) => {
            match serde_json::to_string_pretty(&stats) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("Failed to serialize stats: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Transcode failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with tracing
fn init_logging(settings: &LoggingSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("aac_transcode={}", settings.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if settings.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
