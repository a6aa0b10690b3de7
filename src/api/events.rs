//! `GET /events`: queue events as Server-Sent Events.
//!
//! Each [`QueueEvent`] is sent with its kind as the SSE event name and its
//! JSON form as data. A subscriber that falls behind the broadcast buffer
//! receives a single `lagged` event naming how many events it missed.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::ApiState;
use crate::store::QueueEvent;

/// Convert one queue event into an SSE frame.
fn to_frame(event: &QueueEvent) -> Event {
    Event::default()
        .event(event.kind())
        .json_data(event)
        .unwrap_or_else(|err| {
            warn!(%err, "failed to encode queue event");
            Event::default().event(event.kind()).data("{}")
        })
}

/// `GET /events`.
pub async fn stream_events(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.scheduler.store().subscribe();
    debug!("event subscriber connected");

    let events = stream::unfold(rx, |mut rx| async move {
        let frame = match rx.recv().await {
            Ok(event) => to_frame(&event),
            Err(RecvError::Lagged(missed)) => {
                Event::default().event("lagged").data(missed.to_string())
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(frame), rx))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
