use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{Config, error::ApiError, model::UserRecord, provider::http_client};

pub mod randomuser;

pub use randomuser::RandomUserClient;

/// Remote, paginated source of user records.
#[async_trait]
pub trait UserSource: Send + Sync + Debug {
    /// Fetch one page; `page` is 1-based.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<UserRecord>, ApiError>;
}

pub fn user_source_from_config(config: &Config) -> anyhow::Result<Arc<dyn UserSource>> {
    let mut client = RandomUserClient::new(&config.users.base_url).with_http(http_client(config)?);
    if let Some(seed) = &config.users.seed {
        client = client.with_seed(seed.clone());
    }
    Ok(Arc::new(client))
}
