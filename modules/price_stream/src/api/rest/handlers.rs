use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::rest::error::ApiError;
use crate::model::PriceUpdate;
use crate::pubsub::Unsubscriber;
use crate::StreamState;

/// Heartbeat cadence; comments double as dead-connection probes.
const PING_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub(super) struct StreamQuery {
    since: Option<String>,
}

/// SSE price stream. With `?since=<RFC3339>`, updates missed inside the
/// replay window are emitted before live delivery begins; an update landing
/// between replay and subscription priming may appear twice, so consumers
/// dedup on timestamp.
pub(super) async fn price_stream(
    State(state): State<Arc<StreamState>>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let since = parse_since(query.since.as_deref(), state.buffer.ttl())?;

    let sub = state.pool.subscribe();
    tracing::debug!(subscriber = %sub.id(), "client connected to price stream");

    let replay = match since {
        Some(t) => {
            tracing::debug!(since = %t, "fetching missed prices");
            state.buffer.since(t)
        }
        None => Vec::new(),
    };

    // prime the queue so a fresh client sees the current value immediately
    if let Some(last) = state.buffer.last() {
        state.pool.send_one(&sub, last);
    }

    let (guard, rx) = Unsubscriber::attach(state.pool.clone(), sub);

    let connected = stream::once(std::future::ready(Ok::<Event, Infallible>(
        Event::default().comment("connected"),
    )));
    let replayed = stream::iter(replay.into_iter().map(|update| Ok(data_event(&update))));
    let live = LiveStream {
        rx: ReceiverStream::new(rx),
        _guard: guard,
    }
    .map(|update| Ok(data_event(&update)));

    let stream = connected.chain(replayed).chain(live);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(PING_INTERVAL).text("ping")))
}

/// Live updates plus the unsubscribe guard. Dropping the response stream
/// (client gone, handler error) drops the guard, which unsubscribes.
struct LiveStream<T: Clone + Send + Sync + 'static> {
    rx: ReceiverStream<T>,
    _guard: Unsubscriber<T>,
}

impl<T: Clone + Send + Sync + 'static> Stream for LiveStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.get_mut().rx).poll_next(cx)
    }
}

fn data_event(update: &PriceUpdate) -> Event {
    Event::default()
        .json_data(update)
        .unwrap_or_else(|_| Event::default().data("serialization_error"))
}

fn parse_since(
    raw: Option<&str>,
    ttl: chrono::Duration,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let since = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid 'since' timestamp format: {e}")))?
        .with_timezone(&Utc);

    if since < Utc::now() - ttl {
        return Err(ApiError::BadRequest(
            "'since' timestamp is too old (exceeds buffer TTL)".to_string(),
        ));
    }

    Ok(Some(since))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl() -> chrono::Duration {
        chrono::Duration::seconds(60)
    }

    #[test]
    fn absent_since_is_none() {
        assert!(parse_since(None, ttl()).unwrap().is_none());
        assert!(parse_since(Some(""), ttl()).unwrap().is_none());
    }

    #[test]
    fn valid_since_is_parsed_to_utc() {
        let raw = (Utc::now() - chrono::Duration::seconds(5)).to_rfc3339();
        let parsed = parse_since(Some(&raw), ttl()).unwrap().unwrap();
        assert!((Utc::now() - parsed).num_seconds() >= 5);
    }

    #[test]
    fn malformed_since_is_rejected() {
        let err = parse_since(Some("not-a-timestamp"), ttl()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m.contains("invalid 'since'")));
    }

    #[test]
    fn since_older_than_ttl_is_rejected() {
        let raw = (Utc::now() - chrono::Duration::seconds(120)).to_rfc3339();
        let err = parse_since(Some(&raw), ttl()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m.contains("too old")));
    }

    #[test]
    fn future_since_is_accepted() {
        let raw = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
        assert!(parse_since(Some(&raw), ttl()).unwrap().is_some());
    }
}
