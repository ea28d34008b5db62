//! Nuvex Client
//!
//! Outer surface of the catalog consistency core:
//! - [`ClientConfig`]: TOML configuration
//! - [`PostgrestClient`]: HTTP implementation of the remote store
//! - [`init_tracing`]: tracing subscriber bootstrap
//! - [`CatalogClient`]: cache, gate and coordinator behind one facade,
//!   producing the listing and dashboard read models

pub mod catalog;
pub mod config;
pub mod error;
pub mod rest;
pub mod telemetry;
pub mod views;

pub use catalog::CatalogClient;
pub use config::{CacheSettings, ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use rest::PostgrestClient;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use views::{project_cards, AdminDashboard, AdminProjectRow, ProjectCard, PREVIEW_REVIEWS};

pub use nuvex_storage::{Freshness, GateState, MutationOutcome};
