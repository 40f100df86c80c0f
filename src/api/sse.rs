//! Server-Sent Events support

use crate::runtime::SessionEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SessionEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(session_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(session_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn session_event_to_axum(event: SessionEvent) -> Event {
    let (event_type, data) = match event {
        // A snapshot is always a full resync, whether on connect or after a reset
        SessionEvent::Snapshot(snapshot) => (
            "init",
            json!({
                "type": "init",
                "state": snapshot.state,
                "accepting_input": snapshot.accepting_input,
                "turns": snapshot.turns,
                "highlights": snapshot.highlights,
                "offer": snapshot.offer
            }),
        ),
        SessionEvent::StateChange {
            state,
            accepting_input,
        } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state,
                "accepting_input": accepting_input
            }),
        ),
        SessionEvent::Turn { turn, highlights } => (
            "turn",
            json!({
                "type": "turn",
                "turn": turn,
                "highlights": highlights
            }),
        ),
        SessionEvent::Offer { offer } => (
            "offer",
            json!({
                "type": "offer",
                "offer": offer
            }),
        ),
        SessionEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
