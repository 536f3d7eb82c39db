use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::ApiError, model::UserRecord};

use super::UserSource;

/// Client for the randomuser.me `GET /api/` endpoint.
#[derive(Debug, Clone)]
pub struct RandomUserClient {
    base_url: String,
    seed: Option<String>,
    http: Client,
}

impl RandomUserClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            seed: None,
            http: Client::new(),
        }
    }

    pub fn with_seed(mut self, seed: String) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_http(mut self, http: Client) -> Self {
        self.http = http;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RuResponse {
    #[serde(default)]
    results: Vec<RuUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuName {
    first: String,
    last: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuCoordinates {
    latitude: String,
    longitude: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuLocation {
    city: String,
    country: String,
    coordinates: RuCoordinates,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuLogin {
    uuid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RuPicture {
    large: Option<String>,
    medium: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuUser {
    #[serde(default)]
    login: RuLogin,
    #[serde(default)]
    name: RuName,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    location: RuLocation,
    #[serde(default)]
    picture: RuPicture,
}

impl From<RuUser> for UserRecord {
    fn from(u: RuUser) -> Self {
        UserRecord {
            id: u.login.uuid,
            first_name: u.name.first,
            last_name: u.name.last,
            email: u.email,
            phone: u.phone,
            city: u.location.city,
            country: u.location.country,
            picture_url: u.picture.large.or(u.picture.medium),
            latitude: parse_coordinate(&u.location.coordinates.latitude),
            longitude: parse_coordinate(&u.location.coordinates.longitude),
        }
    }
}

/// Coordinates arrive as strings; anything unparseable maps to the 0.0 "unset" value.
fn parse_coordinate(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[async_trait]
impl UserSource for RandomUserClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<UserRecord>, ApiError> {
        let url = format!("{}/api/", self.base_url);
        tracing::debug!(page, page_size, "requesting user page");

        let mut query = vec![("results", page_size.to_string()), ("page", page.to_string())];
        if let Some(seed) = &self.seed {
            query.push(("seed", seed.clone()));
        }

        let res = self.http.get(&url).query(&query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        let parsed: RuResponse = serde_json::from_str(&body)?;

        Ok(parsed.results.into_iter().map(UserRecord::from).collect())
    }
}
