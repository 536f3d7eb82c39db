//! Current-weather lookup publishing a single, last-write-wins snapshot.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    error::{ApiError, LocationError},
    location::{LocationService, PermissionStatus},
    model::{Coordinates, UserRecord, WeatherSnapshot},
    provider::WeatherProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PermissionDenied,
    NoLastLocation,
    InvalidCoordinates,
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherFailure {
    #[error("failed to get location: {0}")]
    Location(#[from] LocationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug)]
pub enum WeatherOutcome {
    Updated(WeatherSnapshot),
    Skipped(SkipReason),
    Failed(WeatherFailure),
}

#[derive(Debug)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    location: Arc<dyn LocationService>,
    snapshot: watch::Sender<Option<WeatherSnapshot>>,
}

impl WeatherFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>, location: Arc<dyn LocationService>) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self { provider, location, snapshot }
    }

    pub fn snapshot(&self) -> watch::Receiver<Option<WeatherSnapshot>> {
        self.snapshot.subscribe()
    }

    pub fn current(&self) -> Option<WeatherSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Weather for wherever the device last reported being.
    pub async fn fetch_current_location_weather(&self) -> WeatherOutcome {
        if self.location.permission() == PermissionStatus::Denied {
            tracing::debug!("location permission not granted, skipping weather fetch");
            return WeatherOutcome::Skipped(SkipReason::PermissionDenied);
        }

        match self.location.last_known_location().await {
            Ok(Some(at)) => self.fetch_weather(at).await,
            Ok(None) => {
                tracing::error!("last known location is null");
                WeatherOutcome::Skipped(SkipReason::NoLastLocation)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to get location");
                WeatherOutcome::Failed(e.into())
            }
        }
    }

    /// Weather at a user's stored coordinates; unset coordinates are skipped.
    pub async fn fetch_weather_for(&self, user: &UserRecord) -> WeatherOutcome {
        let at = user.coordinates();
        if !at.is_set() {
            tracing::error!(user = %user.id, "invalid coordinates for user");
            return WeatherOutcome::Skipped(SkipReason::InvalidCoordinates);
        }
        self.fetch_weather(at).await
    }

    pub async fn fetch_weather(&self, at: Coordinates) -> WeatherOutcome {
        let provider = self.provider.id();

        match self.provider.current_weather(at).await {
            Ok(snapshot) => {
                tracing::info!(
                    %provider,
                    location = %snapshot.location_name,
                    temperature_c = snapshot.temperature_c,
                    "weather updated"
                );
                self.snapshot.send_replace(Some(snapshot.clone()));
                WeatherOutcome::Updated(snapshot)
            }
            Err(e) => {
                match e.status_code() {
                    Some(status) => tracing::error!(%provider, status, error = %e, "weather HTTP error"),
                    None => tracing::error!(%provider, error = %e, "weather request failed"),
                }
                WeatherOutcome::Failed(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeProvider {
        calls: Mutex<Vec<Coordinates>>,
        fail_with: Mutex<Option<u16>>,
    }

    impl FakeProvider {
        fn failing(status: u16) -> Arc<Self> {
            let p = Self::default();
            *p.fail_with.lock().unwrap() = Some(status);
            Arc::new(p)
        }

        fn calls(&self) -> Vec<Coordinates> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn snapshot_at(at: Coordinates) -> WeatherSnapshot {
        WeatherSnapshot {
            provider: "openweather".into(),
            location_name: format!("Somewhere near {at}"),
            coordinates: at,
            temperature_c: 21.5,
            feels_like_c: 20.0,
            condition: "clear sky".into(),
            humidity_pct: 40,
            wind_speed_mps: 3.2,
            observation_time: Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap(),
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        fn id(&self) -> ProviderId {
            ProviderId::OpenWeather
        }

        async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, ApiError> {
            self.calls.lock().unwrap().push(at);
            match *self.fail_with.lock().unwrap() {
                Some(status) => Err(ApiError::Status { status, body: "nope".into() }),
                None => Ok(snapshot_at(at)),
            }
        }
    }

    #[derive(Debug)]
    struct FakeLocation {
        permission: PermissionStatus,
        last: Result<Option<Coordinates>, LocationError>,
    }

    #[async_trait]
    impl LocationService for FakeLocation {
        fn is_provider_enabled(&self, _: crate::location::LocationProvider) -> bool {
            true
        }

        fn permission(&self) -> PermissionStatus {
            self.permission
        }

        async fn last_known_location(&self) -> Result<Option<Coordinates>, LocationError> {
            self.last.clone()
        }
    }

    fn located_at(last: Result<Option<Coordinates>, LocationError>) -> Arc<FakeLocation> {
        Arc::new(FakeLocation { permission: PermissionStatus::Granted, last })
    }

    fn user_at(latitude: f64, longitude: f64) -> UserRecord {
        UserRecord {
            id: "u1".into(),
            first_name: "Jennie".into(),
            last_name: "Nichols".into(),
            email: String::new(),
            phone: String::new(),
            city: String::new(),
            country: String::new(),
            picture_url: None,
            latitude,
            longitude,
        }
    }

    #[tokio::test]
    async fn successful_fetch_publishes_provider_value() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(None)));
        let at = Coordinates::new(52.37, 4.89);

        assert_eq!(fetcher.current(), None);
        let outcome = fetcher.fetch_weather(at).await;

        assert!(matches!(outcome, WeatherOutcome::Updated(ref s) if *s == snapshot_at(at)));
        assert_eq!(fetcher.current(), Some(snapshot_at(at)));
    }

    #[tokio::test]
    async fn http_500_leaves_snapshot_none() {
        let provider = FakeProvider::failing(500);
        let fetcher = WeatherFetcher::new(provider, located_at(Ok(None)));

        let outcome = fetcher.fetch_weather(Coordinates::new(1.0, 2.0)).await;

        match outcome {
            WeatherOutcome::Failed(WeatherFailure::Api(e)) => assert_eq!(e.status_code(), Some(500)),
            other => panic!("expected api failure, got {other:?}"),
        }
        assert_eq!(fetcher.current(), None);
    }

    #[tokio::test]
    async fn failure_keeps_previous_snapshot() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(None)));
        let first = Coordinates::new(10.0, 20.0);

        fetcher.fetch_weather(first).await;
        *provider.fail_with.lock().unwrap() = Some(503);
        fetcher.fetch_weather(Coordinates::new(30.0, 40.0)).await;

        assert_eq!(fetcher.current(), Some(snapshot_at(first)));
    }

    #[tokio::test]
    async fn latest_fetch_overwrites_snapshot() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = WeatherFetcher::new(provider, located_at(Ok(None)));
        let mut rx = fetcher.snapshot();

        fetcher.fetch_weather(Coordinates::new(10.0, 20.0)).await;
        fetcher.fetch_weather(Coordinates::new(30.0, 40.0)).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|s| s.coordinates),
            Some(Coordinates::new(30.0, 40.0))
        );
    }

    #[tokio::test]
    async fn zero_coordinates_never_call_the_api() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(None)));

        for user in [user_at(0.0, 4.89), user_at(52.37, 0.0), user_at(0.0, 0.0)] {
            let outcome = fetcher.fetch_weather_for(&user).await;
            assert!(matches!(outcome, WeatherOutcome::Skipped(SkipReason::InvalidCoordinates)));
        }

        assert!(provider.calls().is_empty());
        assert_eq!(fetcher.current(), None);
    }

    #[tokio::test]
    async fn user_coordinates_are_forwarded() {
        let provider = Arc::new(FakeProvider::default());
        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(None)));

        let outcome = fetcher.fetch_weather_for(&user_at(-69.8246, 134.8719)).await;

        assert!(matches!(outcome, WeatherOutcome::Updated(_)));
        assert_eq!(provider.calls(), vec![Coordinates::new(-69.8246, 134.8719)]);
    }

    #[tokio::test]
    async fn device_location_is_forwarded() {
        let provider = Arc::new(FakeProvider::default());
        let here = Coordinates::new(48.85, 2.35);
        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(Some(here))));

        assert!(matches!(
            fetcher.fetch_current_location_weather().await,
            WeatherOutcome::Updated(_)
        ));
        assert_eq!(provider.calls(), vec![here]);
    }

    #[tokio::test]
    async fn missing_or_failing_device_location_is_a_no_op() {
        let provider = Arc::new(FakeProvider::default());

        let fetcher = WeatherFetcher::new(provider.clone(), located_at(Ok(None)));
        assert!(matches!(
            fetcher.fetch_current_location_weather().await,
            WeatherOutcome::Skipped(SkipReason::NoLastLocation)
        ));

        let fetcher =
            WeatherFetcher::new(provider.clone(), located_at(Err(LocationError::ServiceUnavailable)));
        assert!(matches!(
            fetcher.fetch_current_location_weather().await,
            WeatherOutcome::Failed(WeatherFailure::Location(LocationError::ServiceUnavailable))
        ));

        assert!(provider.calls().is_empty());
        assert_eq!(fetcher.current(), None);
    }

    #[tokio::test]
    async fn denied_permission_skips_silently() {
        let provider = Arc::new(FakeProvider::default());
        let location = Arc::new(FakeLocation {
            permission: PermissionStatus::Denied,
            last: Ok(Some(Coordinates::new(1.0, 1.0))),
        });
        let fetcher = WeatherFetcher::new(provider.clone(), location);

        assert!(matches!(
            fetcher.fetch_current_location_weather().await,
            WeatherOutcome::Skipped(SkipReason::PermissionDenied)
        ));
        assert!(provider.calls().is_empty());
    }
}
