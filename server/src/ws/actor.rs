use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authorized chat connection.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader task: drains inbound frames and handles keepalive
///
/// The mpsc sender registered with the connection registry is how broadcasts
/// reach this client. Clients do not push messages over this channel; any
/// inbound data frame is ignored.
///
/// Every exit path — client close, transport error, pong timeout — falls
/// through to the same cleanup below, and the registry removal is idempotent,
/// so racing error and close paths cannot double-free the entry.
pub async fn run_connection(socket: WebSocket, state: AppState, chat_id: String, user_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register this connection under the chat bucket
    ws::connect(&state.connections, &chat_id, &user_id, tx.clone());

    tracing::info!(chat_id = %chat_id, user_id = %user_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn keepalive task: sends periodic pings and monitors pong responses
    let mut ping_handle = tokio::spawn(keepalive_loop(
        tx.clone(),
        pong_rx,
        PING_INTERVAL,
        PONG_TIMEOUT,
    ));

    // Reader loop: the registry is receive-only from the client's side, so
    // data frames carry no application behavior here. The loop races against
    // the keepalive task: a silently dead peer (NAT drop, power loss) never
    // sends another frame, so keepalive giving up must tear the actor down
    // rather than leave the reader waiting on the socket.
    loop {
        tokio::select! {
            _ = &mut ping_handle => {
                tracing::warn!(
                    chat_id = %chat_id,
                    user_id = %user_id,
                    "Keepalive gave up, closing connection"
                );
                break;
            }
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(msg)) => match msg {
                    Message::Text(_) | Message::Binary(_) => {
                        tracing::debug!(
                            chat_id = %chat_id,
                            user_id = %user_id,
                            "Ignoring inbound data frame on receive-only channel"
                        );
                    }
                    Message::Pong(_) => {
                        let _ = pong_tx.send(());
                    }
                    Message::Ping(data) => {
                        let _ = tx.send(Message::Pong(data));
                    }
                    Message::Close(frame) => {
                        tracing::info!(
                            chat_id = %chat_id,
                            user_id = %user_id,
                            reason = ?frame,
                            "Client initiated close"
                        );
                        break;
                    }
                },
                Some(Err(e)) => {
                    tracing::warn!(
                        chat_id = %chat_id,
                        user_id = %user_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    // Stream ended — client disconnected
                    tracing::info!(chat_id = %chat_id, user_id = %user_id, "WebSocket stream ended");
                    break;
                }
            },
        }
    }

    // Cleanup: abort writer and keepalive tasks, then drop the registry entry.
    writer_handle.abort();
    ping_handle.abort();
    ws::disconnect(&state.connections, &chat_id, &user_id);

    tracing::info!(chat_id = %chat_id, user_id = %user_id, "WebSocket actor stopped");
}

/// Keepalive: ping on every `ping_interval` tick and expect a pong within
/// `pong_timeout`. Returns when the peer stops answering (after pushing a
/// Close frame through the writer) or when the writer is already gone.
/// Completion of this future is the dead-connection signal the reader loop
/// selects on, so detection never depends on the peer sending anything back.
async fn keepalive_loop(
    ping_tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    ping_interval: Duration,
    pong_timeout: Duration,
) {
    let mut ping_timer = interval(ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died — connection is gone
            break;
        }

        match timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {
                // Pong received, continue
            }
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Paused-clock tests: tokio auto-advances time while all tasks are idle,
    // so the real 30s/10s constants run instantly.

    #[tokio::test(start_paused = true)]
    async fn keepalive_gives_up_when_pongs_never_arrive() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_pong_tx, pong_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(keepalive_loop(tx, pong_rx, PING_INTERVAL, PONG_TIMEOUT));

        // One ping goes out and is never answered
        assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
        // The peer gets a Close frame...
        assert!(matches!(rx.recv().await, Some(Message::Close(_))));
        // ...and the task completes. This completion is what the reader loop
        // selects on, so a silently dead peer still reaches the disconnect
        // cleanup instead of leaving a stale registry entry.
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_keeps_running_while_pongs_arrive() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(keepalive_loop(tx, pong_rx, PING_INTERVAL, PONG_TIMEOUT));

        // Answer three pings, then go silent
        for _ in 0..3 {
            assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
            pong_tx.send(()).unwrap();
        }
        assert!(matches!(rx.recv().await, Some(Message::Ping(_))));
        assert!(matches!(rx.recv().await, Some(Message::Close(_))));
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_stops_when_the_writer_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_pong_tx, pong_rx) = mpsc::unbounded_channel();
        drop(rx); // writer task has exited

        keepalive_loop(tx, pong_rx, PING_INTERVAL, PONG_TIMEOUT).await;
    }
}
