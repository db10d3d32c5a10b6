//! Minimal CoinDesk data-API client: top-list retrieval and a paginated
//! asset-price lookup on top of it.

use std::time::Duration;

mod model;
mod page;
mod toplist;

pub use model::{Asset, AssetPrice, Data, Stats, TopList};
pub use page::Page;

/// Default timeout for requests to the CoinDesk API.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("failed making request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to parse top list response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("invalid response status from {url}. got: {status}, body: {body:?}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },
    #[error("no assets found for page {0}")]
    EmptyPage(u32),
    #[error("asset {0} not found in top list")]
    SymbolNotFound(String),
    #[error("{0}")]
    InvalidPage(String),
}

/// Client for the CoinDesk data API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl Client {
    /// Build a client for the given base URL and API key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    /// Resolve the current price of `symbol`, walking top-list pages from
    /// `page` onward until the symbol appears or pagination is exhausted.
    ///
    /// The page walk is bounded by the page count derived from the first
    /// response's `TOTAL_ASSETS`, so a misbehaving upstream cannot loop it.
    pub async fn asset_price(&self, symbol: &str, page: Page) -> Result<AssetPrice, ClientError> {
        let mut current = page;
        let mut last_page: Option<u32> = None;

        loop {
            let top = self.top_list(current).await?;

            if top.data.assets.is_empty() {
                return Err(ClientError::EmptyPage(current.number()));
            }

            if let Some(asset) = top.data.assets.iter().find(|a| a.symbol == symbol) {
                return Ok(AssetPrice::from(asset));
            }

            let stats = &top.data.stats;
            let bound =
                *last_page.get_or_insert_with(|| stats.total_assets.div_ceil(stats.page_size.max(1)));

            if stats.page * stats.page_size < stats.total_assets && current.number() < bound {
                current = current.next()?;
            } else {
                return Err(ClientError::SymbolNotFound(symbol.to_string()));
            }
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
