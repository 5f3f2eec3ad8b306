// src/api/mod.rs
// HTTP surface: SSE endpoints for chat, the Pilot system, and learning,
// plus JSON introspection of MCPs and prompts.

pub mod agent_run;
pub mod chat;
pub mod events;
pub mod learn;
pub mod mcps;
pub mod router;

pub use router::build_router;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;

use events::ServerEvent;

/// Buffer size of each request's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Turn a request's event channel into an SSE response. The stream ends
/// when the worker task drops its sender.
pub fn sse_response(
    rx: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
