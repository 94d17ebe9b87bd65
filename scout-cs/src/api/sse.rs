//! Server-Sent Events (SSE) for search progress streaming

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;

/// Optional filters for the event stream
#[derive(Debug, Deserialize)]
pub struct EventStreamParams {
    /// Restrict the stream to one session's events
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// GET /events - SSE stream of search progress
///
/// Streams every `ScoutEvent` as it is emitted, the serde type tag doubling
/// as the SSE event name. Pass `?session_id=` to follow a single search.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<EventStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(session_filter = ?params.session_id, "New SSE client connected");

    let mut rx = state.event_bus.subscribe();
    let filter = params.session_id;

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                // Heartbeat keeps proxies from closing an idle stream
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }

                Ok(event) = rx.recv() => {
                    if let Some(wanted) = filter {
                        if event.session_id() != wanted {
                            continue;
                        }
                    }

                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE: broadcasting {}", event_type);
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => {
                            warn!("SSE: failed to serialize {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
