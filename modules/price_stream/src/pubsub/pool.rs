use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use super::{Broadcaster, Subscriber, SubscriberShared};

/// Partitioned set of broadcasters. New subscribers land on any broadcaster
/// with room, or on a freshly created one; empty broadcasters are removed;
/// one subscriber migrates from the most- to the least-loaded broadcaster
/// after each admission or removal until the spread is at most one.
///
/// Lock order is always pool, then broadcaster. Subscription never fails:
/// exhaustion shows up as more broadcasters, not as rejection.
pub struct BroadcasterPool<T> {
    max_peers: usize,
    pool: RwLock<HashMap<Uuid, Arc<Broadcaster<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> BroadcasterPool<T> {
    pub fn new(max_peers: usize) -> Self {
        Self {
            max_peers,
            pool: RwLock::new(HashMap::new()),
        }
    }

    /// Add a subscriber to the most appropriate broadcaster.
    pub fn subscribe(&self) -> Subscriber<T> {
        // Fast path: any broadcaster with room, found under the read lock.
        let found = {
            let pool = self.pool.read();
            pool.values().find_map(|b| {
                b.try_subscribe(self.max_peers).map(|sub| {
                    tracing::debug!(broadcaster = %b.id(), subscribers = b.len(), "reusing broadcaster");
                    sub
                })
            })
        };

        if let Some(sub) = found {
            let pool = self.pool.write();
            Self::rebalance(&pool, self.max_peers);
            return sub;
        }

        // All full (or none exist): create a broadcaster under the write lock.
        let mut pool = self.pool.write();

        // A slot may have opened between the locks.
        if let Some(sub) = pool.values().find_map(|b| b.try_subscribe(self.max_peers)) {
            Self::rebalance(&pool, self.max_peers);
            return sub;
        }

        let broadcaster = Arc::new(Broadcaster::new());
        let sub = broadcaster.subscribe();
        tracing::debug!(broadcaster = %broadcaster.id(), "created new broadcaster");
        pool.insert(broadcaster.id(), broadcaster);

        Self::rebalance(&pool, self.max_peers);

        sub
    }

    /// Remove a subscriber from its broadcaster, dropping the broadcaster if
    /// it ends up empty.
    pub fn unsubscribe(&self, sub: Subscriber<T>) {
        let (shared, _rx) = sub.into_parts();
        self.unsubscribe_shared(&shared);
    }

    pub(super) fn unsubscribe_shared(&self, shared: &SubscriberShared) {
        let mut pool = self.pool.write();

        let broadcaster_id = shared.broadcaster_id();
        if let Some(broadcaster) = pool.get(&broadcaster_id) {
            broadcaster.unsubscribe(shared.id());

            if broadcaster.is_empty() {
                tracing::debug!(broadcaster = %broadcaster_id, "removing empty broadcaster");
                pool.remove(&broadcaster_id);
            }
        }

        Self::rebalance(&pool, self.max_peers);
    }

    /// Deliver `update` to every subscriber of every broadcaster, one task
    /// per broadcaster, returning once all fan-outs completed.
    pub async fn broadcast(&self, update: T) {
        let broadcasters: Vec<Arc<Broadcaster<T>>> =
            { self.pool.read().values().cloned().collect() };

        let mut tasks = Vec::with_capacity(broadcasters.len());
        for broadcaster in broadcasters {
            let update = update.clone();
            tasks.push(tokio::spawn(async move {
                broadcaster.broadcast(&update);
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
    }

    /// Non-blocking send to a single subscriber, through its broadcaster.
    pub fn send_one(&self, sub: &Subscriber<T>, update: T) {
        let pool = self.pool.read();
        if let Some(broadcaster) = pool.get(&sub.broadcaster_id()) {
            broadcaster.send_one(sub.id(), update);
        }
    }

    /// Number of broadcasters in the pool.
    pub fn pool_len(&self) -> usize {
        self.pool.read().len()
    }

    /// Total number of subscribers across all broadcasters.
    pub fn subscribers_count(&self) -> usize {
        self.pool.read().values().map(|b| b.len()).sum()
    }

    pub fn broadcaster(&self, id: Uuid) -> Option<Arc<Broadcaster<T>>> {
        self.pool.read().get(&id).cloned()
    }

    /// Move one subscriber from the most- to the least-loaded broadcaster if
    /// they differ by more than one. Runs with the pool lock held; the two
    /// membership locks are taken in id order.
    fn rebalance(pool: &HashMap<Uuid, Arc<Broadcaster<T>>>, max_peers: usize) {
        if pool.len() <= 1 {
            return;
        }

        let mut max_broadcaster: Option<&Arc<Broadcaster<T>>> = None;
        let mut min_broadcaster: Option<&Arc<Broadcaster<T>>> = None;
        let mut max_count = 0;
        let mut min_count = max_peers + 1;

        for broadcaster in pool.values() {
            let len = broadcaster.len();
            if max_broadcaster.is_none() || len > max_count {
                max_count = len;
                max_broadcaster = Some(broadcaster);
            }
            if min_broadcaster.is_none() || len < min_count {
                min_count = len;
                min_broadcaster = Some(broadcaster);
            }
        }

        let (Some(max_broadcaster), Some(min_broadcaster)) = (max_broadcaster, min_broadcaster)
        else {
            return;
        };

        if max_count - min_count <= 1 || max_broadcaster.id() == min_broadcaster.id() {
            tracing::trace!(max = max_count, min = min_count, "broadcasters balanced");
            return;
        }

        let (first, second) = if max_broadcaster.id() < min_broadcaster.id() {
            (max_broadcaster, min_broadcaster)
        } else {
            (min_broadcaster, max_broadcaster)
        };
        let mut first_members = first.subscribers.write();
        let mut second_members = second.subscribers.write();
        let (max_members, min_members) = if first.id() == max_broadcaster.id() {
            (&mut first_members, &mut second_members)
        } else {
            (&mut second_members, &mut first_members)
        };

        // any member of the overloaded broadcaster will do
        let Some(id) = max_members.keys().next().copied() else {
            return;
        };
        let Some(handle) = max_members.remove(&id) else {
            return;
        };

        handle.shared.set_broadcaster(min_broadcaster.id());
        min_members.insert(id, handle);

        tracing::debug!(
            subscriber = %id,
            to = %min_broadcaster.id(),
            max = max_members.len(),
            min = min_members.len(),
            "moved subscriber between broadcasters"
        );
    }
}
