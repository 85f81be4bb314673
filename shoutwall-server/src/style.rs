//! Randomized cosmetic styling for accepted messages.
//!
//! Purely presentation: positions, a length-dependent font-size class, and
//! one of two fixed colors. Field names are the web client's CSS fields.

use rand::Rng;
use serde::Serialize;

/// The two display colors, chosen uniformly.
const MESSAGE_COLORS: [&str; 2] = ["#FFFFFF", "#044B7F"];

/// Messages shorter than this draw from the larger font-size range.
const SHORT_MESSAGE_LEN: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledMessage {
    pub msg: String,
    pub css_top: u32,
    pub css_left: u32,
    pub css_font_size: f32,
    pub css_color: &'static str,
}

impl StyledMessage {
    /// Style a message for broadcast: vertical 10–85%, horizontal 2–90%,
    /// font size by length class, rounded to one decimal.
    pub fn compose(msg: String) -> Self {
        let mut rng = rand::thread_rng();
        let css_top = rng.gen_range(10..=85);
        let css_left = rng.gen_range(2..=90);
        let size_range = if msg.chars().count() < SHORT_MESSAGE_LEN {
            1.0f32..2.0
        } else {
            0.8f32..1.3
        };
        let css_font_size = (rng.gen_range(size_range) * 10.0).round() / 10.0;
        let css_color = MESSAGE_COLORS[rng.gen_range(0..MESSAGE_COLORS.len())];
        Self {
            msg,
            css_top,
            css_left,
            css_font_size,
            css_color,
        }
    }
}
