//! Fan-out of updates to subscribers, partitioned across a pool of
//! broadcasters. Delivery is non-blocking: a subscriber whose queue is full
//! misses that update.

mod broadcaster;
mod pool;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use broadcaster::Broadcaster;
pub use pool::BroadcasterPool;

/// Bounded inbound queue per subscriber.
pub(crate) const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// Identity of a subscriber plus the id of its current owner. The owner id
/// is behind a lock because rebalancing repoints it while the subscriber is
/// held elsewhere.
pub(crate) struct SubscriberShared {
    id: Uuid,
    broadcaster: Mutex<Uuid>,
}

impl SubscriberShared {
    fn new(broadcaster: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            broadcaster: Mutex::new(broadcaster),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn broadcaster_id(&self) -> Uuid {
        *self.broadcaster.lock()
    }

    fn set_broadcaster(&self, id: Uuid) {
        *self.broadcaster.lock() = id;
    }
}

/// Receiving end of a subscription. The queue is closed exactly once, when
/// the pool unsubscribes this subscriber.
pub struct Subscriber<T> {
    shared: Arc<SubscriberShared>,
    rx: mpsc::Receiver<T>,
}

impl<T> Subscriber<T> {
    pub fn id(&self) -> Uuid {
        self.shared.id()
    }

    /// Id of the broadcaster currently owning this subscriber.
    pub fn broadcaster_id(&self) -> Uuid {
        self.shared.broadcaster_id()
    }

    /// Next queued update; `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    fn into_parts(self) -> (Arc<SubscriberShared>, mpsc::Receiver<T>) {
        (self.shared, self.rx)
    }
}

/// Drop-guard that unsubscribes from the pool. Binding it into a response
/// stream guarantees exactly-once unsubscription on every exit path.
pub struct Unsubscriber<T: Clone + Send + Sync + 'static> {
    pool: Arc<BroadcasterPool<T>>,
    shared: Arc<SubscriberShared>,
}

impl<T: Clone + Send + Sync + 'static> Unsubscriber<T> {
    /// Split the subscriber into its receiver and a guard that unsubscribes
    /// on drop.
    pub fn attach(pool: Arc<BroadcasterPool<T>>, sub: Subscriber<T>) -> (Self, mpsc::Receiver<T>) {
        let (shared, rx) = sub.into_parts();
        (Self { pool, shared }, rx)
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Unsubscriber<T> {
    fn drop(&mut self) {
        self.pool.unsubscribe_shared(&self.shared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsubscriber_guard_unsubscribes_on_drop() {
        let pool = Arc::new(BroadcasterPool::<u32>::new(4));
        let sub = pool.subscribe();
        assert_eq!(pool.subscribers_count(), 1);

        let (guard, _rx) = Unsubscriber::attach(pool.clone(), sub);
        drop(guard);

        assert_eq!(pool.subscribers_count(), 0);
        assert_eq!(pool.pool_len(), 0);
    }

    #[tokio::test]
    async fn receiver_drains_after_guard_drop() {
        let pool = Arc::new(BroadcasterPool::<u32>::new(4));
        let sub = pool.subscribe();

        let (guard, mut rx) = Unsubscriber::attach(pool.clone(), sub);
        pool.broadcast(7).await;
        drop(guard);

        // queued item is still delivered, then the closed queue ends
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }
}
