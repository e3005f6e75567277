//! Server-Sent Events (SSE) utilities

use crate::events::{EventBus, MxcEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Stream bus events matching `filter` to one SSE client.
///
/// Starts with a `ConnectionStatus: connected` event; lagged or
/// unserializable events are skipped.
pub fn create_event_sse_stream<F>(
    bus: &EventBus,
    client: String,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&MxcEvent) -> bool + Send + Sync + 'static,
{
    info!("New SSE client connected: {}", client);

    let connected = futures::stream::once(async {
        Ok::<_, Infallible>(Event::default().event("ConnectionStatus").data("connected"))
    });

    let events = BroadcastStream::new(bus.subscribe()).filter_map(move |result| {
        let item = match result {
            Ok(event) if filter(&event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!("SSE {}: {}", client, event.event_type());
                    Some(Ok(Event::default().event(event.event_type()).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!("SSE stream error: {:?}", e);
                None
            }
        };
        async move { item }
    });

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
