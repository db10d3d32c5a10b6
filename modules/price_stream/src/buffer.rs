use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::model::Timestamped;

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("buffer ttl is out of range")]
    InvalidTtl,
}

/// Time- and size-bounded FIFO of recent entries. Writers are the producer
/// and the expiration sweep; readers take consistent snapshots.
#[derive(Debug)]
pub struct ReplayBuffer<T> {
    items: RwLock<VecDeque<T>>,
    max_size: usize,
    ttl: chrono::Duration,
}

impl<T: Timestamped + Clone> ReplayBuffer<T> {
    pub fn new(ttl: Duration, max_size: usize) -> Result<Self, BufferError> {
        if max_size == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| BufferError::InvalidTtl)?;

        Ok(Self {
            items: RwLock::new(VecDeque::new()),
            max_size,
            ttl,
        })
    }

    /// Append an entry, evicting the oldest one when at capacity.
    pub fn add(&self, update: T) {
        let mut items = self.items.write();

        if items.len() == self.max_size {
            items.pop_front();
        }

        items.push_back(update);
    }

    /// The most recently appended entry, if any.
    pub fn last(&self) -> Option<T> {
        self.items.read().back().cloned()
    }

    /// Snapshot of all entries strictly newer than `since`, in append order.
    pub fn since(&self, since: DateTime<Utc>) -> Vec<T> {
        self.items
            .read()
            .iter()
            .filter(|u| u.timestamp() > since)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Drop the contiguous prefix of entries aged past the TTL. Stops at the
    /// first retained entry, so a stale entry sitting behind a fresh one
    /// survives until the fresh one expires too (the producer is monotone,
    /// this does not happen in practice).
    fn trim_expired(&self, now: DateTime<Utc>) {
        let cutoff = now - self.ttl;
        let mut items = self.items.write();

        while let Some(front) = items.front() {
            if front.timestamp() > cutoff {
                break;
            }
            items.pop_front();
        }
    }
}

/// Periodic expiration sweep. Runs until `cancel` fires; each tick holds the
/// write lock only for the trim itself.
pub async fn run_sweeper<T>(
    buffer: Arc<ReplayBuffer<T>>,
    interval: Duration,
    cancel: CancellationToken,
) where
    T: Timestamped + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("buffer sweeper stopped");
                return;
            }
            _ = ticker.tick() => {
                buffer.trim_expired(Utc::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceUpdate;

    fn update(secs_ago: i64, price: f64) -> PriceUpdate {
        PriceUpdate {
            symbol: "BTC".to_string(),
            timestamp: Utc::now() - chrono::Duration::seconds(secs_ago),
            price,
        }
    }

    fn buffer(ttl_secs: u64, max_size: usize) -> ReplayBuffer<PriceUpdate> {
        ReplayBuffer::new(Duration::from_secs(ttl_secs), max_size).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ReplayBuffer::<PriceUpdate>::new(Duration::from_secs(60), 0).unwrap_err();
        assert!(matches!(err, BufferError::ZeroCapacity));
    }

    #[test]
    fn add_evicts_oldest_at_capacity() {
        let buf = buffer(60, 3);
        for i in 0..5 {
            buf.add(update(10 - i, i as f64));
        }

        assert_eq!(buf.len(), 3);
        let retained: Vec<f64> = buf.since(Utc::now() - chrono::Duration::seconds(60))
            .iter()
            .map(|u| u.price)
            .collect();
        assert_eq!(retained, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn last_returns_most_recent() {
        let buf = buffer(60, 10);
        assert!(buf.last().is_none());

        buf.add(update(2, 1.0));
        buf.add(update(1, 2.0));
        assert_eq!(buf.last().unwrap().price, 2.0);
    }

    #[test]
    fn since_is_strict_and_ordered() {
        let buf = buffer(60, 10);
        let base = Utc::now();
        for i in 0..4 {
            buf.add(PriceUpdate {
                symbol: "BTC".to_string(),
                timestamp: base + chrono::Duration::seconds(i),
                price: i as f64,
            });
        }

        // strictly after base+1: entries at +2 and +3
        let result = buf.since(base + chrono::Duration::seconds(1));
        let prices: Vec<f64> = result.iter().map(|u| u.price).collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }

    #[test]
    fn since_snapshot_is_independent_of_mutation() {
        let buf = buffer(60, 10);
        buf.add(update(5, 1.0));

        let snapshot = buf.since(Utc::now() - chrono::Duration::seconds(60));
        buf.add(update(1, 2.0));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].price, 1.0);
    }

    #[test]
    fn since_in_the_future_is_empty() {
        let buf = buffer(60, 10);
        buf.add(update(1, 1.0));
        assert!(buf.since(Utc::now() + chrono::Duration::seconds(60)).is_empty());
    }

    #[test]
    fn trim_removes_expired_prefix_only() {
        let buf = buffer(10, 10);
        buf.add(update(30, 1.0));
        buf.add(update(20, 2.0));
        buf.add(update(1, 3.0));

        buf.trim_expired(Utc::now());

        assert_eq!(buf.len(), 1);
        assert_eq!(buf.last().unwrap().price, 3.0);
    }

    #[test]
    fn trim_stops_at_first_retained_entry() {
        let buf = buffer(10, 10);
        // out-of-order: a fresh entry before a stale one
        buf.add(update(1, 1.0));
        buf.add(update(30, 2.0));

        buf.trim_expired(Utc::now());

        // the stale entry hides behind the fresh one and survives
        assert_eq!(buf.len(), 2);
    }

    #[tokio::test]
    async fn sweeper_expires_old_entries_and_stops_on_cancel() {
        let buf = Arc::new(buffer(10, 10));
        buf.add(update(30, 1.0));
        buf.add(update(20, 2.0));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweeper(
            buf.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(buf.len(), 0);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop on cancellation")
            .unwrap();
    }
}
