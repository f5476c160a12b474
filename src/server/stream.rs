// src/server/stream.rs

//! WebSocket endpoints that run an operation and relay its output.

use std::future::Future;
use std::pin::Pin;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::engine::Operation;
use crate::relay::{LogObserver, ObserverGone, error_line, reject, relay_operation};

use super::AppState;

/// Observer writing each line as one text frame.
pub struct WsObserver {
    sink: SplitSink<WebSocket, Message>,
}

impl WsObserver {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

impl LogObserver for WsObserver {
    fn send_line(
        &mut self,
        line: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), ObserverGone>> + Send + '_>> {
        Box::pin(async move {
            self.sink
                .send(Message::Text(line.into()))
                .await
                .map_err(|_| ObserverGone)
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Err(err) = self.sink.close().await {
                debug!(error = %err, "websocket close failed");
            }
        })
    }
}

/// Split `socket`, drain inbound frames in the background so control frames
/// are answered, and hand back the outbound half as an observer.
fn observer_for(socket: WebSocket) -> WsObserver {
    let (sink, mut inbound) = socket.split();
    tokio::spawn(async move { while let Some(Ok(_)) = inbound.next().await {} });
    WsObserver::new(sink)
}

async fn relay_over(socket: WebSocket, state: AppState, operation: Operation) {
    let mut observer = observer_for(socket);
    let outcome = relay_operation(&state.executor, operation, &mut observer).await;
    info!(outcome = ?outcome, "stream request finished");
}

/// WS /api/ws/provision
pub async fn ws_provision(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let operation = (*state.provision).clone();
        relay_over(socket, state, operation).await;
    })
}

/// WS /api/ws/deprovision
pub async fn ws_deprovision(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let operation = (*state.deprovision).clone();
        relay_over(socket, state, operation).await;
    })
}

/// WS /api/playbooks/ws/run/{name}
///
/// The playbook name is checked before the busy check, so an invalid name is
/// reported as such even while another operation runs.
pub async fn ws_run_playbook(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        match state.catalog.resolve(&name) {
            Ok(operation) => relay_over(socket, state, operation).await,
            Err(err) => {
                info!(playbook = %name, error = %err, "rejecting playbook run");
                let mut observer = observer_for(socket);
                reject(&mut observer, error_line(&err.to_string())).await;
            }
        }
    })
}
