//! Server-Sent Events (SSE) handler

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};

use super::AppState;
use crate::hub::Payload;

/// One subscriber per connection. The stream ends when the hub drops the
/// subscriber or the server shuts down; a client disconnect drops the stream,
/// which unsubscribes it.
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();
    tracing::debug!("Stream client subscribed as {}", subscription.id());

    let event_stream = subscription
        .take_until(state.shutdown.clone().cancelled_owned())
        .map(|payload: Payload| Ok(Event::default().data(&*payload)));

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text("ping"),
    )
}
