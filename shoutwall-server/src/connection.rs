//! Admission, message, and disconnect handling — the hub's event core.
//!
//! The transport adapter (see [`crate::web`]) turns socket activity into
//! calls here; these functions are plain and synchronous so the whole
//! state machine can be driven deterministically in tests. Each handler
//! takes the event's wall-clock `Instant` as a parameter — the windows are
//! compared lazily at decision time, never swept in the background.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::fanout::{self, ServerEvent};
use crate::ratelimit::{self, Verdict};
use crate::registry::ConnId;
use crate::server::SharedState;
use crate::style::StyledMessage;

/// Outbound queue depth per connection. A slow consumer drops events
/// rather than backing up the hub.
const OUTBOUND_BUFFER: usize = 64;

/// A successfully admitted connection: its id and the receiving end of
/// its outbound event queue. When the hub tears the connection down the
/// sender is dropped and `rx` runs dry — that is the transport's signal
/// to close the socket.
pub struct Admitted {
    pub id: ConnId,
    pub rx: mpsc::Receiver<ServerEvent>,
}

/// Admit a connection from `addr`, allocate its outbound channel, catch it
/// up on the current topic, and announce the new presence count. Returns
/// `None` when the address is over its connection cap; the caller must
/// close the transport without allocating anything further.
pub fn handle_connect(state: &SharedState, addr: &str) -> Option<Admitted> {
    let id = match state.registry.lock().admit(addr) {
        Ok(id) => id,
        Err(_) => {
            tracing::info!(%addr, "connection rejected: address at cap");
            return None;
        }
    };

    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);

    // Catch the late joiner up before the public announcement.
    let _ = tx.try_send(ServerEvent::NewTopic(state.current_topic.lock().clone()));
    state.peers.lock().insert(id, tx);

    let presence = state.registry.lock().presence();
    tracing::info!(%id, %addr, presence, "connection admitted");
    fanout::broadcast_presence(state, presence);

    Some(Admitted { id, rx })
}

/// Outcome of one inbound message event, surfaced for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Broadcast,
    InvalidPayload,
    Throttled,
    Banned,
    /// The connection was already torn down; stale events are no-ops.
    UnknownConnection,
}

/// Process one inbound text payload from `id` at `now`.
pub fn handle_message(
    state: &SharedState,
    id: ConnId,
    payload: &str,
    now: Instant,
) -> MessageOutcome {
    if !ratelimit::payload_ok(payload) {
        tracing::debug!(%id, len = payload.chars().count(), "message dropped: invalid payload");
        return MessageOutcome::InvalidPayload;
    }

    let verdict = {
        let mut registry = state.registry.lock();
        let Some(windows) = registry.windows(id) else {
            return MessageOutcome::UnknownConnection;
        };
        let verdict = ratelimit::assess(windows.recent, windows.grey, now);
        match verdict {
            Verdict::Accept => registry.record_message(id, now),
            Verdict::Throttle => registry.record_throttle(id, now),
            Verdict::Ban => {}
        }
        verdict
    };

    match verdict {
        Verdict::Accept => {
            let styled = StyledMessage::compose(payload.to_string());
            tracing::debug!(%id, msg = %styled.msg, "broadcasting message");
            fanout::broadcast_message(state, styled);
            MessageOutcome::Broadcast
        }
        Verdict::Throttle => {
            tracing::debug!(%id, "message dropped: rate limited");
            MessageOutcome::Throttled
        }
        Verdict::Ban => {
            tracing::info!(%id, "grey-list threshold exceeded, disconnecting");
            remove_and_announce(state, id);
            MessageOutcome::Banned
        }
    }
}

/// Transport-level disconnect. Safe to call after a forced teardown — the
/// registry treats unknown ids as a no-op.
pub fn handle_disconnect(state: &SharedState, id: ConnId) {
    if remove_and_announce(state, id) {
        tracing::info!(%id, presence = state.registry.lock().presence(), "connection closed");
    }
}

/// Tear down a connection: drop its registry state and outbound channel,
/// then announce the new presence count. Returns `false` if the id was
/// already gone.
fn remove_and_announce(state: &SharedState, id: ConnId) -> bool {
    if !state.registry.lock().release(id) {
        return false;
    }
    state.peers.lock().remove(&id);
    let presence = state.registry.lock().presence();
    fanout::broadcast_presence(state, presence);
    true
}
