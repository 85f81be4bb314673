//! Best-effort fanout of server events to every live connection.

use serde::Serialize;

use crate::server::SharedState;
use crate::style::StyledMessage;
use crate::topics::Topic;

/// Events pushed to connected clients, serialized as
/// `{"event": "...", "data": ...}` text frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserCount(usize),
    NewMessage(StyledMessage),
    NewTopic(Topic),
}

/// Send an event to every live connection. Fire-and-forget: a peer whose
/// outbound queue is full or already closed simply misses this event.
pub fn broadcast(state: &SharedState, event: &ServerEvent) {
    let peers = state.peers.lock();
    for tx in peers.values() {
        let _ = tx.try_send(event.clone());
    }
}

pub fn broadcast_presence(state: &SharedState, count: usize) {
    broadcast(state, &ServerEvent::UserCount(count));
}

pub fn broadcast_message(state: &SharedState, message: StyledMessage) {
    broadcast(state, &ServerEvent::NewMessage(message));
}

pub fn broadcast_topic(state: &SharedState, topic: Topic) {
    broadcast(state, &ServerEvent::NewTopic(topic));
}
