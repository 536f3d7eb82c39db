//! Periodic check that some location provider is enabled.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::location::{LocationPrompt, LocationService, PromptChoice};

/// Result of a single availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCheck {
    Available,
    PromptRaised,
    PromptAlreadyShowing,
}

pub struct LocationMonitor {
    location: Arc<dyn LocationService>,
    prompt: Arc<dyn LocationPrompt>,
    prompt_showing: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl LocationMonitor {
    pub fn new(location: Arc<dyn LocationService>, prompt: Arc<dyn LocationPrompt>) -> Self {
        Self {
            location,
            prompt,
            prompt_showing: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// True iff at least one of the device's location providers is enabled.
    pub fn is_location_available(&self) -> bool {
        self.location.any_provider_enabled()
    }

    pub fn is_prompt_showing(&self) -> bool {
        self.prompt_showing.load(Ordering::Acquire)
    }

    /// Evaluate availability once, raising the prompt if nothing is enabled
    /// and no prompt is up yet. Must be called from within a tokio runtime.
    pub fn check(&self) -> MonitorCheck {
        if self.is_location_available() {
            tracing::trace!("location provider available");
            return MonitorCheck::Available;
        }

        if self
            .prompt_showing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("location still off, prompt already showing");
            return MonitorCheck::PromptAlreadyShowing;
        }

        tracing::warn!("no location provider enabled, prompting user");

        let prompt = Arc::clone(&self.prompt);
        let showing = Arc::clone(&self.prompt_showing);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {}
                choice = prompt.prompt_enable_location() => match choice {
                    PromptChoice::OpenSettings => {
                        tracing::info!("opening location settings");
                        prompt.open_location_settings();
                    }
                    PromptChoice::Dismiss => tracing::info!("location prompt dismissed"),
                    PromptChoice::Interrupted => {
                        tracing::info!("location prompt interrupted, stopping monitor");
                        shutdown.cancel();
                    }
                },
            }
            showing.store(false, Ordering::Release);
        });

        MonitorCheck::PromptRaised
    }

    /// Run [`check`](Self::check) now and then every `period` until cancelled.
    pub fn spawn(self, period: Duration) -> MonitorHandle {
        let cancel = self.shutdown.clone();
        let task = tokio::spawn(async move { self.run(period).await });

        MonitorHandle { cancel, task: Some(task) }
    }

    async fn run(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = period.as_secs_f64(), "location monitor started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check();
                }
            }
        }

        tracing::info!("location monitor stopped");
    }
}

/// Owns a running monitor; dropping it stops the loop.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the monitor has been asked to stop, by its owner or by
    /// an interrupted prompt.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "location monitor task ended abnormally");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
