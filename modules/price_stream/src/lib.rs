//! Live price streaming: a TTL-bounded replay buffer, a load-balanced
//! broadcaster pool with lossy fan-out, a polling producer, and the SSE
//! endpoint composing them.

use std::sync::Arc;

pub mod api;
pub mod buffer;
pub mod model;
pub mod poller;
pub mod pubsub;

pub use buffer::{run_sweeper, BufferError, ReplayBuffer};
pub use model::{PriceUpdate, Timestamped};
pub use poller::{Poller, PriceSource};
pub use pubsub::{Broadcaster, BroadcasterPool, Subscriber, Unsubscriber};

/// Shared state behind the streaming endpoint.
pub struct StreamState {
    pub buffer: Arc<ReplayBuffer<PriceUpdate>>,
    pub pool: Arc<BroadcasterPool<PriceUpdate>>,
}

impl StreamState {
    pub fn new(
        buffer: Arc<ReplayBuffer<PriceUpdate>>,
        pool: Arc<BroadcasterPool<PriceUpdate>>,
    ) -> Self {
        Self { buffer, pool }
    }
}
