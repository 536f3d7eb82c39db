//! Platform-facing location seams.
//!
//! The host (a mobile shell, a desktop app, the CLI) implements
//! [`LocationService`] for provider switches, permission and the last-known
//! fix, and [`LocationPrompt`] for the "enable location" dialog.

use async_trait::async_trait;
use std::{fmt::Debug, path::PathBuf};

use crate::{
    Config,
    config::DeviceConfig,
    error::LocationError,
    model::Coordinates,
};

/// Device subsystems capable of reporting a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationProvider {
    /// Satellite-based.
    Gps,
    Network,
}

impl LocationProvider {
    pub const fn all() -> &'static [LocationProvider] {
        &[LocationProvider::Gps, LocationProvider::Network]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocationProvider::Gps => "gps",
            LocationProvider::Network => "network",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationService: Send + Sync + Debug {
    fn is_provider_enabled(&self, provider: LocationProvider) -> bool;

    /// True iff at least one provider is enabled.
    fn any_provider_enabled(&self) -> bool {
        LocationProvider::all()
            .iter()
            .any(|p| self.is_provider_enabled(*p))
    }

    fn permission(&self) -> PermissionStatus;

    /// Last fix the platform knows about; `Ok(None)` when it has none.
    async fn last_known_location(&self) -> Result<Option<Coordinates>, LocationError>;
}

/// What the user picked in the "location is off" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    OpenSettings,
    Dismiss,
    /// The user asked to quit from inside the prompt; the monitor stops.
    Interrupted,
}

#[async_trait]
pub trait LocationPrompt: Send + Sync {
    /// Show the prompt and wait for the user's answer.
    async fn prompt_enable_location(&self) -> PromptChoice;

    fn open_location_settings(&self);
}

/// A [`LocationService`] backed by the `[device]` section of a config file.
///
/// The file is re-read on every query so edits show up while a monitor runs.
#[derive(Debug, Clone)]
pub struct ConfigDevice {
    path: PathBuf,
}

impl ConfigDevice {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn device(&self) -> Result<DeviceConfig, LocationError> {
        Config::load_from(&self.path)
            .map(|cfg| cfg.device)
            .map_err(|e| LocationError::Other(format!("{e:#}")))
    }
}

#[async_trait]
impl LocationService for ConfigDevice {
    // Each query is a blocking read of the config file on the calling thread.
    fn is_provider_enabled(&self, provider: LocationProvider) -> bool {
        match self.device() {
            Ok(device) => match provider {
                LocationProvider::Gps => device.gps_enabled,
                LocationProvider::Network => device.network_enabled,
            },
            Err(e) => {
                tracing::warn!(provider = provider.as_str(), error = %e, "could not read device state");
                false
            }
        }
    }

    fn any_provider_enabled(&self) -> bool {
        match self.device() {
            Ok(device) => device.gps_enabled || device.network_enabled,
            Err(e) => {
                tracing::warn!(error = %e, "could not read device state");
                false
            }
        }
    }

    fn permission(&self) -> PermissionStatus {
        match self.device() {
            Ok(device) if device.permission_granted => PermissionStatus::Granted,
            _ => PermissionStatus::Denied,
        }
    }

    async fn last_known_location(&self) -> Result<Option<Coordinates>, LocationError> {
        let device = self.device()?;
        if !device.gps_enabled && !device.network_enabled {
            return Err(LocationError::ServiceUnavailable);
        }
        Ok(device.last_known_location())
    }
}
