//! Grey-list rate limiting: saturation detection and ban escalation.
//!
//! Evaluated once per inbound message event. The connection's state
//! (Normal, Throttled, Banned) is never stored; it is derived from the two
//! bounded windows each time. Rejected messages are only recorded in the
//! grey window — the recent window ages out solely through its oldest
//! accepted timestamp, so a saturated connection cannot talk its way out
//! of saturation by sending more.

use std::time::{Duration, Instant};

use crate::registry::{RateWindow, WINDOW_CAP};

/// Span over which a full recent window counts as saturated.
pub const RECENT_SPAN: Duration = Duration::from_secs(10);

/// Span over which a full grey window escalates to a ban.
pub const GREY_SPAN: Duration = Duration::from_secs(30);

/// Inclusive maximum accepted message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 99;

/// Outcome of evaluating one inbound message against a connection's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Within limits: broadcast and record in the recent window.
    Accept,
    /// Saturated: drop silently and record in the grey window. Silence is
    /// the throttle signal — the sender gets no rejection notice.
    Throttle,
    /// Saturated and past the grey-list threshold: tear the connection down.
    Ban,
}

/// `true` iff the window is full and its oldest entry is within `span` of `now`.
fn window_hot(window: &RateWindow, now: Instant, span: Duration) -> bool {
    window.len() == WINDOW_CAP
        && window
            .oldest()
            .is_some_and(|oldest| now.duration_since(oldest) < span)
}

/// Evaluate one message event. Mutates nothing; the caller records the
/// outcome (accept into the recent window, throttle into the grey window).
pub fn assess(recent: &RateWindow, grey: &RateWindow, now: Instant) -> Verdict {
    if !window_hot(recent, now, RECENT_SPAN) {
        return Verdict::Accept;
    }
    if window_hot(grey, now, GREY_SPAN) {
        Verdict::Ban
    } else {
        Verdict::Throttle
    }
}

/// Only non-empty text up to [`MAX_MESSAGE_LEN`] characters is eligible
/// for broadcast. Anything else is dropped with no state change.
pub fn payload_ok(text: &str) -> bool {
    let len = text.chars().count();
    len > 0 && len <= MAX_MESSAGE_LEN
}
