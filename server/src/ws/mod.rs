//! Live-connection registry and broadcast fan-out.
//!
//! Runtime-only state: chat_id -> { user_id -> transport handle }. Entries
//! exist only while a client is connected; nothing here survives a restart.
//!
//! Concurrency discipline: connect/disconnect mutate a chat bucket and
//! broadcast iterates it. DashMap's shard locking makes those mutually
//! exclusive for the same bucket — a broadcaster never observes a
//! half-mutated bucket. No ordering is guaranteed across different chats.

pub mod actor;
pub mod handler;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chat::registry::MessageRecord;

/// Sender half of a WebSocket connection's channel. Cloning this lets any
/// part of the system push frames to that client; the receiver side is owned
/// by the connection's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Per-chat buckets of live connections. One handle per (chat, user): a user
/// re-connecting to the same chat replaces their previous handle.
pub type ChatConnections = Arc<DashMap<String, HashMap<String, ConnectionSender>>>;

/// Create a new empty connection registry.
pub fn new_chat_connections() -> ChatConnections {
    Arc::new(DashMap::new())
}

/// Register a handle under the chat/user keys, creating the chat bucket if
/// absent.
pub fn connect(registry: &ChatConnections, chat_id: &str, user_id: &str, tx: ConnectionSender) {
    registry
        .entry(chat_id.to_string())
        .or_default()
        .insert(user_id.to_string(), tx);

    tracing::debug!(chat_id = %chat_id, user_id = %user_id, "connection registered");
}

/// Remove the mapping entry for (chat, user); drops the chat bucket when it
/// becomes empty so stale buckets do not accumulate. Removing an absent
/// entry is a no-op, which makes double-invocation on teardown harmless.
pub fn disconnect(registry: &ChatConnections, chat_id: &str, user_id: &str) {
    if let Entry::Occupied(mut bucket) = registry.entry(chat_id.to_string()) {
        bucket.get_mut().remove(user_id);
        if bucket.get().is_empty() {
            bucket.remove();
        }
    }

    tracing::debug!(chat_id = %chat_id, user_id = %user_id, "connection unregistered");
}

/// Deliver a message to every handle currently registered for the chat.
/// Delivery is attempted per recipient: one failed send (receiver already
/// dropped) is logged and does not stop the remaining sends — the failed
/// entry is cleaned up by its own connection's disconnect path.
pub fn broadcast(registry: &ChatConnections, chat_id: &str, record: &MessageRecord) {
    let payload = match serde_json::to_string(record) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize broadcast payload");
            return;
        }
    };
    let msg = axum::extract::ws::Message::Text(payload.into());

    if let Some(bucket) = registry.get(chat_id) {
        for (user_id, sender) in bucket.iter() {
            if sender.send(msg.clone()).is_err() {
                tracing::warn!(
                    chat_id = %chat_id,
                    user_id = %user_id,
                    "broadcast delivery failed, connection pending cleanup"
                );
            }
        }
    }
}
