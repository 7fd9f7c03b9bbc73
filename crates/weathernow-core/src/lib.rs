pub mod config;
pub mod error;

pub use config::{ApiConfig, CacheConfig, Config, LocationConfig, ValidationResult};
pub use error::{AppError, ConfigError, ErrorKind};

use anyhow::Result;

/// Initialize the core application
///
/// Loads a `.env` file when one is present (so API keys can live outside the
/// config file) and installs the tracing subscriber. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn init() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    tracing::info!("WeatherNow core initialized");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
