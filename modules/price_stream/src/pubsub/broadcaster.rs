use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Subscriber, SubscriberShared, SUBSCRIBER_QUEUE_CAPACITY};

/// Sending end of a subscription, kept in the membership set. Dropping the
/// handle closes the subscriber's queue.
pub(super) struct SubscriberHandle<T> {
    pub(super) shared: Arc<SubscriberShared>,
    tx: mpsc::Sender<T>,
}

/// A set of subscribers receiving the same updates. Sends never block:
/// broadcasting to a full queue drops the update for that subscriber.
pub struct Broadcaster<T> {
    id: Uuid,
    pub(super) subscribers: RwLock<HashMap<Uuid, SubscriberHandle<T>>>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Add a new subscriber unconditionally.
    pub fn subscribe(&self) -> Subscriber<T> {
        let (sub, handle) = self.new_subscriber();
        self.subscribers.write().insert(sub.id(), handle);
        sub
    }

    /// Add a new subscriber only if there is room, checked under the write
    /// lock so concurrent admissions cannot overfill the set.
    pub(super) fn try_subscribe(&self, max_peers: usize) -> Option<Subscriber<T>> {
        let mut subscribers = self.subscribers.write();
        if subscribers.len() >= max_peers {
            return None;
        }

        let (sub, handle) = self.new_subscriber();
        subscribers.insert(sub.id(), handle);
        Some(sub)
    }

    /// Remove a subscriber, closing its queue. Callers ensure exactly-once.
    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.write().remove(&id);
    }

    /// Deliver `update` to every current member with a non-blocking send.
    pub fn broadcast(&self, update: &T) {
        let subscribers = self.subscribers.read();
        for handle in subscribers.values() {
            // full queue: skip slow clients
            let _ = handle.tx.try_send(update.clone());
        }
    }

    /// Non-blocking send to a single member.
    pub fn send_one(&self, id: Uuid, update: T) {
        if let Some(handle) = self.subscribers.read().get(&id) {
            let _ = handle.tx.try_send(update);
        }
    }

    fn new_subscriber(&self) -> (Subscriber<T>, SubscriberHandle<T>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let shared = Arc::new(SubscriberShared::new(self.id));

        (
            Subscriber {
                shared: shared.clone(),
                rx,
            },
            SubscriberHandle { shared, tx },
        )
    }
}

impl<T: Clone + Send + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_len() {
        let b = Broadcaster::<u32>::new();
        assert_eq!(b.len(), 0);

        let s1 = b.subscribe();
        let _s2 = b.subscribe();
        assert_eq!(b.len(), 2);
        assert_eq!(s1.broadcaster_id(), b.id());
    }

    #[tokio::test]
    async fn try_subscribe_respects_capacity() {
        let b = Broadcaster::<u32>::new();
        assert!(b.try_subscribe(2).is_some());
        assert!(b.try_subscribe(2).is_some());
        assert!(b.try_subscribe(2).is_none());
        assert_eq!(b.len(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_queue() {
        let b = Broadcaster::<u32>::new();
        let mut sub = b.subscribe();

        b.unsubscribe(sub.id());
        assert_eq!(b.len(), 0);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let b = Broadcaster::<u32>::new();
        let mut s1 = b.subscribe();
        let mut s2 = b.subscribe();

        b.broadcast(&42);

        assert_eq!(s1.recv().await, Some(42));
        assert_eq!(s2.recv().await, Some(42));
    }

    #[tokio::test]
    async fn full_queue_drops_update_without_blocking() {
        let b = Broadcaster::<usize>::new();
        let mut slow = b.subscribe();
        let mut fast = b.subscribe();

        // one more than the queue holds
        for i in 0..=SUBSCRIBER_QUEUE_CAPACITY {
            b.broadcast(&i);
        }

        // drain the fast subscriber completely: it saw the overflow drop too
        let mut fast_seen = 0;
        while fast.try_recv().is_some() {
            fast_seen += 1;
        }
        assert_eq!(fast_seen, SUBSCRIBER_QUEUE_CAPACITY);

        // slow subscriber holds exactly the first CAPACITY updates, in order
        for expected in 0..SUBSCRIBER_QUEUE_CAPACITY {
            assert_eq!(slow.try_recv(), Some(expected));
        }
        assert_eq!(slow.try_recv(), None);
    }

    #[tokio::test]
    async fn send_one_targets_a_single_member() {
        let b = Broadcaster::<u32>::new();
        let mut s1 = b.subscribe();
        let mut s2 = b.subscribe();

        b.send_one(s1.id(), 7);

        assert_eq!(s1.recv().await, Some(7));
        assert_eq!(s2.try_recv(), None);
    }

    #[tokio::test]
    async fn send_one_to_unknown_id_is_a_noop() {
        let b = Broadcaster::<u32>::new();
        b.send_one(Uuid::new_v4(), 7);
    }
}
