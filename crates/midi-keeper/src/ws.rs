//! WebSocket observer connections.
//!
//! Every observer gets a full status snapshot on connect, then a live relay
//! of lifecycle events. A periodic snapshot goes out once a second, but only
//! while a recording is live or the system is armed; an idle system stays
//! quiet on the wire.

use crate::routes::AppState;

use std::time::Duration;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use midi_keeper_core::{Event, StatusSnapshot};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{self, Instant};
use tracing::{debug, instrument, warn};

const SNAPSHOT_PERIOD: Duration = Duration::from_secs(1);

/// Upgrade handler for `GET /events`.
#[instrument(skip(state, ws))]
pub(crate) async fn events_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

/// Whether the periodic snapshot should go out in the current state.
pub(crate) fn should_push_periodic(status: &StatusSnapshot) -> bool {
    status.is_recording || status.is_hooked_for_recording
}

async fn handle_observer(socket: WebSocket, state: AppState) {
    debug!("observer connected");

    let (mut sink, mut stream) = socket.split();
    let mut events = state.events.subscribe();

    let snapshot = state.recorder.status().await;
    if send_event(&mut sink, &Event::Status { data: snapshot })
        .await
        .is_err()
    {
        return;
    }

    let mut ticker = time::interval_at(Instant::now() + SNAPSHOT_PERIOD, SNAPSHOT_PERIOD);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = state.recorder.status().await;
                if should_push_periodic(&status)
                    && send_event(&mut sink, &Event::Status { data: status })
                        .await
                        .is_err()
                {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer lagged, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            closed = observer_closed(&mut stream) => {
                if closed {
                    break;
                }
            }
        }
    }

    // Dropping the broadcast receiver releases this observer's subscription
    // without touching the others.
    debug!("observer disconnected");
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &Event,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize event");
            return Ok(());
        }
    };

    sink.send(Message::Text(json.into())).await
}

/// Poll the inbound half; resolves true once the observer is gone.
async fn observer_closed(stream: &mut SplitStream<WebSocket>) -> bool {
    match stream.next().await {
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => true,
        Some(Ok(_)) => false,
    }
}
