//! Core library for the `listing` client.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Remote clients for the user list and weather providers
//! - The user list loader, weather fetcher and location availability monitor,
//!   each publishing its state through `tokio::sync::watch` channels
//!
//! It is used by `listing-cli`, but the components take their collaborators
//! as trait objects so other hosts can drive them too.

pub mod config;
pub mod error;
pub mod loader;
pub mod location;
pub mod model;
pub mod monitor;
pub mod provider;
pub mod users;
pub mod weather;

pub use config::{Config, DeviceConfig, ProviderConfig};
pub use error::{ApiError, LocationError};
pub use loader::{LoadCursor, LoadOutcome, UserListLoader};
pub use location::{
    ConfigDevice, LocationPrompt, LocationProvider, LocationService, PermissionStatus,
    PromptChoice,
};
pub use model::{Coordinates, UserRecord, WeatherSnapshot};
pub use monitor::{LocationMonitor, MonitorCheck, MonitorHandle};
pub use provider::{ProviderId, WeatherProvider, default_provider_from_config, provider_from_config};
pub use users::{RandomUserClient, UserSource, user_source_from_config};
pub use weather::{SkipReason, WeatherFailure, WeatherFetcher, WeatherOutcome};
