//! Live-connection registry: address counts, presence, and per-connection
//! rate windows.
//!
//! The registry is the single owner of connection lifecycle state. A
//! connection exists exactly between a successful [`Registry::admit`] and
//! the first [`Registry::release`] for its id; everything else in the hub
//! treats unknown ids as stale events and ignores them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Capacity of both per-connection rate windows.
pub const WINDOW_CAP: usize = 10;

/// Opaque identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Fixed-capacity FIFO of event timestamps, oldest first.
///
/// The eleventh insertion evicts the oldest entry; the window never holds
/// more than [`WINDOW_CAP`] timestamps.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    slots: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self {
            slots: VecDeque::with_capacity(WINDOW_CAP),
        }
    }

    pub fn push(&mut self, at: Instant) {
        if self.slots.len() == WINDOW_CAP {
            self.slots.pop_front();
        }
        self.slots.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn oldest(&self) -> Option<Instant> {
        self.slots.front().copied()
    }
}

/// Rejection returned when an address already has the maximum number of
/// live connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("address has reached its connection cap")]
pub struct Rejected;

/// Read-only view of a connection's windows at decision time.
pub struct WindowSnapshot<'a> {
    pub recent: &'a RateWindow,
    pub grey: &'a RateWindow,
}

#[derive(Debug)]
struct ConnState {
    addr: String,
    /// Timestamps of the most recent accepted messages.
    recent: RateWindow,
    /// Timestamps of the most recent throttle triggers.
    grey: RateWindow,
}

/// Tracks every live connection, its originating address, and its rate
/// windows. Presence is the number of live entries.
#[derive(Debug, Default)]
pub struct Registry {
    conns: HashMap<ConnId, ConnState>,
    by_addr: HashMap<String, u32>,
    addr_cap: u32,
    next_id: u64,
}

impl Registry {
    pub fn new(addr_cap: u32) -> Self {
        Self {
            addr_cap,
            ..Self::default()
        }
    }

    /// Admit a connection from `addr`, allocating empty rate windows under
    /// a fresh id. The address count is incremented speculatively and
    /// rolled back on rejection, so a rejected attempt leaves the
    /// address's live count untouched.
    pub fn admit(&mut self, addr: &str) -> Result<ConnId, Rejected> {
        let count = self.by_addr.entry(addr.to_string()).or_insert(0);
        *count += 1;
        if *count > self.addr_cap {
            *count -= 1;
            return Err(Rejected);
        }

        self.next_id += 1;
        let id = ConnId(self.next_id);
        self.conns.insert(
            id,
            ConnState {
                addr: addr.to_string(),
                recent: RateWindow::new(),
                grey: RateWindow::new(),
            },
        );
        Ok(id)
    }

    /// Remove a connection and decrement its address count. Returns `false`
    /// for unknown (or already released) ids, which keeps double releases
    /// and stray disconnect events from corrupting the counter.
    pub fn release(&mut self, id: ConnId) -> bool {
        let Some(state) = self.conns.remove(&id) else {
            return false;
        };
        match self.by_addr.get_mut(&state.addr) {
            Some(n) if *n > 1 => *n -= 1,
            _ => {
                self.by_addr.remove(&state.addr);
            }
        }
        true
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.conns.contains_key(&id)
    }

    /// Number of live connections.
    pub fn presence(&self) -> usize {
        self.conns.len()
    }

    /// Number of live connections from one address.
    pub fn connections_from(&self, addr: &str) -> u32 {
        self.by_addr.get(addr).copied().unwrap_or(0)
    }

    /// Record an accepted message at `at` in the connection's recent window.
    pub fn record_message(&mut self, id: ConnId, at: Instant) {
        if let Some(state) = self.conns.get_mut(&id) {
            state.recent.push(at);
        }
    }

    /// Record a throttle trigger at `at` in the connection's grey window.
    pub fn record_throttle(&mut self, id: ConnId, at: Instant) {
        if let Some(state) = self.conns.get_mut(&id) {
            state.grey.push(at);
        }
    }

    /// Snapshot of both windows for the rate limiter's decision logic.
    pub fn windows(&self, id: ConnId) -> Option<WindowSnapshot<'_>> {
        self.conns.get(&id).map(|state| WindowSnapshot {
            recent: &state.recent,
            grey: &state.grey,
        })
    }
}
