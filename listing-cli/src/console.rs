use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use inquire::{InquireError, Select};
use listing_core::{LocationPrompt, PromptChoice, UserRecord, WeatherSnapshot};

const GO_TO_SETTINGS: &str = "Go to Settings";
const CANCEL: &str = "Cancel";

/// Terminal rendition of the "Enable Location" dialog.
#[derive(Debug, Clone)]
pub struct ConsolePrompt {
    config_path: PathBuf,
}

impl ConsolePrompt {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }
}

#[async_trait]
impl LocationPrompt for ConsolePrompt {
    async fn prompt_enable_location(&self) -> PromptChoice {
        let answer = tokio::task::spawn_blocking(|| {
            Select::new(
                "Enable Location: your location is turned off. Please enable it for better experience.",
                vec![GO_TO_SETTINGS, CANCEL],
            )
            .prompt()
        })
        .await;

        match answer {
            Ok(answer) => choice_from(answer),
            Err(e) => {
                tracing::warn!(error = %e, "location prompt task failed");
                PromptChoice::Dismiss
            }
        }
    }

    fn open_location_settings(&self) {
        println!(
            "Location providers are set under [device] in {}\n\
             Set `gps_enabled` or `network_enabled` to true; the change is picked up on the next check.",
            self.config_path.display()
        );
    }
}

/// Ctrl-C inside the prompt arrives as `OperationInterrupted` because the
/// terminal is in raw mode, so it has to be turned into a quit request here.
fn choice_from(answer: Result<&str, InquireError>) -> PromptChoice {
    match answer {
        Ok(GO_TO_SETTINGS) => PromptChoice::OpenSettings,
        Ok(_) => PromptChoice::Dismiss,
        Err(InquireError::OperationInterrupted) => PromptChoice::Interrupted,
        Err(e) => {
            tracing::debug!(error = %e, "location prompt closed");
            PromptChoice::Dismiss
        }
    }
}

pub fn print_users(users: &[UserRecord]) {
    for (idx, user) in users.iter().enumerate() {
        let coords = if user.coordinates().is_set() {
            user.coordinates().to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{idx:>4}  {:<28} {:<32} {}, {}  [{coords}]",
            user.full_name(),
            user.email,
            user.city,
            user.country,
        );
    }
}

pub fn print_snapshot(snapshot: &WeatherSnapshot) {
    let observed = snapshot.observation_time.with_timezone(&Local);

    println!("{} ({})", snapshot.location_name, snapshot.coordinates);
    println!("  {}", snapshot.condition);
    println!(
        "  {:.1}°C, feels like {:.1}°C",
        snapshot.temperature_c, snapshot.feels_like_c
    );
    println!(
        "  humidity {}%, wind {:.1} m/s",
        snapshot.humidity_pct, snapshot.wind_speed_mps
    );
    println!(
        "  observed {} via {}",
        observed.format("%Y-%m-%d %H:%M"),
        snapshot.provider
    );
}
