use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coindesk_client::{AssetPrice, Client, ClientError, Page};
use tokio_util::sync::CancellationToken;

use crate::buffer::ReplayBuffer;
use crate::model::PriceUpdate;
use crate::pubsub::BroadcasterPool;

/// Rows requested per upstream page.
const PAGE_ROWS: u32 = 100;

/// Source of current asset prices. The upstream client walks result pages
/// internally until the symbol appears.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn asset_price(&self, symbol: &str, page: Page) -> Result<AssetPrice, ClientError>;
}

#[async_trait]
impl PriceSource for Client {
    async fn asset_price(&self, symbol: &str, page: Page) -> Result<AssetPrice, ClientError> {
        Client::asset_price(self, symbol, page).await
    }
}

/// Periodically refreshes the tracked symbol's price, feeding the replay
/// buffer and the broadcaster pool. Unchanged prices are not re-broadcast.
pub struct Poller {
    source: Arc<dyn PriceSource>,
    symbol: String,
    poll_interval: Duration,
    buffer: Arc<ReplayBuffer<PriceUpdate>>,
    pool: Arc<BroadcasterPool<PriceUpdate>>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PriceSource>,
        symbol: impl Into<String>,
        poll_interval: Duration,
        buffer: Arc<ReplayBuffer<PriceUpdate>>,
        pool: Arc<BroadcasterPool<PriceUpdate>>,
    ) -> Self {
        Self {
            source,
            symbol: symbol.into(),
            poll_interval,
            buffer,
            pool,
        }
    }

    /// Poll until `cancel` fires. Upstream failures are logged and skipped;
    /// the ticker keeps running.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.poll_interval,
            self.poll_interval,
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("poller stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    async fn poll_once(&self) {
        let page = match Page::new(1, PAGE_ROWS) {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(error = %e, "failed to create pagination");
                return;
            }
        };

        let price = match self.source.asset_price(&self.symbol, page).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(error = %e, symbol = %self.symbol, "failed to fetch asset price");
                return;
            }
        };

        let update = PriceUpdate::from(price);

        // unchanged price: nothing for subscribers to learn
        if let Some(last) = self.buffer.last() {
            if last.price == update.price {
                tracing::debug!(price = update.price, "skipping broadcast for unchanged price");
                return;
            }
        }

        tracing::info!(symbol = %update.symbol, price = update.price, "broadcasting update");

        self.buffer.add(update.clone());
        self.pool.broadcast(update).await;
    }
}
