use std::{future::Future, path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password};
use listing_core::{
    Config, ConfigDevice, LoadOutcome, LocationMonitor, LocationService, MonitorHandle,
    PermissionStatus, ProviderId, SkipReason, UserListLoader, WeatherFetcher, WeatherOutcome,
    WeatherSnapshot, default_provider_from_config, user_source_from_config,
};
use tokio::sync::watch;

use crate::console::{ConsolePrompt, print_snapshot, print_users};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "listing", version, about = "User list, weather and location monitor")]
pub struct Cli {
    /// Path to the config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a weather provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Load pages of users and print them.
    Users {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Show current weather for the device location or a listed user.
    Weather {
        /// Index of a user in the loaded list.
        #[arg(long)]
        user: Option<usize>,

        /// Maximum number of pages to load while looking for `--user`.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Monitor location availability and report weather until Ctrl-C.
    Watch,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        let config = Config::load_from(&config_path)?;

        match self.command {
            Command::Configure { provider } => configure(config, &config_path, &provider),
            Command::Users { pages } => {
                let loader = user_loader(&config)?;
                load_pages(&loader, pages, None).await;
                print_users(&loader.current());
                Ok(())
            }
            Command::Weather { user, pages } => {
                let device = Arc::new(ConfigDevice::new(config_path));
                let fetcher = WeatherFetcher::new(default_provider_from_config(&config)?, device);

                let outcome = match user {
                    None => fetcher.fetch_current_location_weather().await,
                    Some(idx) => {
                        let loader = user_loader(&config)?;
                        load_pages(&loader, pages, Some(idx)).await;
                        let users = loader.current();
                        let record = users.get(idx).with_context(|| {
                            format!("No user at index {idx}; only {} loaded.", users.len())
                        })?;
                        println!("Weather for {}", record.full_name());
                        fetcher.fetch_weather_for(record).await
                    }
                };

                report(outcome)
            }
            Command::Watch => watch(config, config_path).await,
        }
    }
}

fn configure(mut config: Config, path: &std::path::Path, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let previous_default = config.default_provider.clone();
    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if previous_default.as_deref().is_some_and(|d| d != id.as_str()) {
        let make_default = Confirm::new(&format!("Make {id} the default provider?"))
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save_to(path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn user_loader(config: &Config) -> anyhow::Result<UserListLoader> {
    Ok(UserListLoader::new(user_source_from_config(config)?, config.users.page_size))
}

/// Load up to `pages` pages, stopping early once `until` is a valid index.
async fn load_pages(loader: &UserListLoader, pages: u32, until: Option<usize>) {
    for _ in 0..pages.max(1) {
        match loader.load_next_page().await {
            LoadOutcome::Loaded { .. } | LoadOutcome::AlreadyLoading => {}
            LoadOutcome::Failed(e) => {
                eprintln!("Could not load users: {e}");
                break;
            }
        }
        if until.is_some_and(|idx| idx < loader.current().len()) {
            break;
        }
    }
}

fn report(outcome: WeatherOutcome) -> anyhow::Result<()> {
    match outcome {
        WeatherOutcome::Updated(snapshot) => {
            print_snapshot(&snapshot);
            Ok(())
        }
        WeatherOutcome::Skipped(reason) => {
            eprintln!("{}", skip_message(reason));
            Ok(())
        }
        WeatherOutcome::Failed(e) => bail!("Weather lookup failed: {e}"),
    }
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::PermissionDenied => {
            "Location permission not granted; set `permission_granted = true` under [device]."
        }
        SkipReason::NoLastLocation => {
            "No last known location; set `latitude` and `longitude` under [device]."
        }
        SkipReason::InvalidCoordinates => "This user has no coordinates.",
    }
}

async fn watch(config: Config, config_path: PathBuf) -> anyhow::Result<()> {
    let device = Arc::new(ConfigDevice::new(config_path.clone()));
    let fetcher = Arc::new(WeatherFetcher::new(
        default_provider_from_config(&config)?,
        device.clone(),
    ));
    let snapshots = fetcher.snapshot();

    let monitor = LocationMonitor::new(device.clone(), Arc::new(ConsolePrompt::new(config_path)))
        .spawn(config.monitor_interval());

    if device.permission() == PermissionStatus::Granted {
        let fetcher = Arc::clone(&fetcher);
        tokio::spawn(async move {
            if let WeatherOutcome::Skipped(reason) = fetcher.fetch_current_location_weather().await {
                eprintln!("{}", skip_message(reason));
            }
        });
    }

    print_until_stopped(snapshots, &monitor, tokio::signal::ctrl_c()).await;

    monitor.shutdown().await;
    Ok(())
}

/// Print snapshot updates until `quit` fires or the monitor stops, whichever
/// comes first. Ctrl-C during the location prompt stops the monitor.
async fn print_until_stopped<Q>(
    mut snapshots: watch::Receiver<Option<WeatherSnapshot>>,
    monitor: &MonitorHandle,
    quit: Q,
) where
    Q: Future,
{
    tokio::pin!(quit);

    loop {
        tokio::select! {
            _ = &mut quit => break,
            _ = monitor.stopped() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(snapshot) = snapshots.borrow_and_update().clone() {
                    print_snapshot(&snapshot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use listing_core::{
        Coordinates, LocationError, LocationPrompt, LocationProvider, PromptChoice,
    };
    use std::time::Duration;

    #[derive(Debug)]
    struct LocationOff;

    #[async_trait]
    impl LocationService for LocationOff {
        fn is_provider_enabled(&self, _: LocationProvider) -> bool {
            false
        }

        fn permission(&self) -> PermissionStatus {
            PermissionStatus::Granted
        }

        async fn last_known_location(&self) -> Result<Option<Coordinates>, LocationError> {
            Err(LocationError::ServiceUnavailable)
        }
    }

    struct CtrlCPrompt;

    #[async_trait]
    impl LocationPrompt for CtrlCPrompt {
        async fn prompt_enable_location(&self) -> PromptChoice {
            PromptChoice::Interrupted
        }

        fn open_location_settings(&self) {}
    }

    #[tokio::test]
    async fn watch_loop_exits_when_prompt_is_interrupted() {
        let (_tx, snapshots) = watch::channel(None);
        let monitor = LocationMonitor::new(Arc::new(LocationOff), Arc::new(CtrlCPrompt))
            .spawn(Duration::from_secs(5));

        tokio::time::timeout(
            Duration::from_secs(2),
            print_until_stopped(snapshots, &monitor, std::future::pending::<()>()),
        )
        .await
        .expect("loop should exit after an interrupted prompt");

        assert!(monitor.is_cancelled());
        monitor.shutdown().await;
    }

    #[tokio::test]
    async fn watch_loop_exits_on_quit_signal() {
        let (_tx, snapshots) = watch::channel(None);
        let monitor = LocationMonitor::new(Arc::new(LocationOff), Arc::new(CtrlCPrompt))
            .spawn(Duration::from_secs(5));
        monitor.cancel();

        tokio::time::timeout(
            Duration::from_secs(2),
            print_until_stopped(snapshots, &monitor, std::future::ready(())),
        )
        .await
        .expect("loop should exit on quit");
    }
}
