//! Tracing subscriber bootstrap.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! human-readable or JSON `fmt` layer. Safe to call more than once.

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ClientError, ClientResult};

/// Filter used when `NUVEX_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "nuvex=info";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Output format of the `fmt` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `nuvex_storage=debug`.
    pub filter: String,
    pub format: LogFormat,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var("NUVEX_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
            format: std::env::var("NUVEX_LOG_FORMAT")
                .map(|value| LogFormat::from_env_value(&value))
                .unwrap_or_default(),
            service_name: std::env::var("NUVEX_SERVICE_NAME")
                .unwrap_or_else(|_| "nuvex-client".to_string()),
        }
    }
}

impl TelemetryConfig {
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber.
///
/// Only the first successful call installs a subscriber; later calls return
/// `Ok(())`. Fails if another global subscriber was installed elsewhere.
pub fn init_tracing(config: &TelemetryConfig) -> ClientResult<()> {
    INITIALIZED
        .get_or_try_init(|| {
            let registry = tracing_subscriber::registry().with(config.env_filter());
            let result = match config.format {
                LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
                LogFormat::Human => registry.with(tracing_subscriber::fmt::layer()).try_init(),
            };
            result.map_err(|e| ClientError::Telemetry(format!("Failed to init subscriber: {}", e)))?;

            tracing::info!(
                service_name = config.service_name,
                format = ?config.format,
                filter = config.filter,
                "Telemetry initialized"
            );
            Ok(())
        })
        .map(|_| ())
}
