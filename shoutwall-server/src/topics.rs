//! Topic rotation: the `TopicSource` seam, the file-backed source, and
//! the wall-clock schedule math.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// The currently broadcast announcement. Overwritten whole on rotation;
/// nothing keeps topic history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Topic {
    /// Placeholder shown until the first rotation completes.
    pub fn placeholder() -> Self {
        Self {
            title: "Loading...".to_string(),
            url: None,
        }
    }
}

/// Supplies the next topic to broadcast. The hub never interprets the
/// source's selection policy.
pub trait TopicSource: Send {
    fn next_topic(&mut self) -> Topic;

    /// Optional push trigger: a channel the source ticks whenever it wants
    /// a rotation ahead of the wall-clock cadence.
    fn schedule_ticks(&mut self) -> Option<mpsc::Receiver<()>> {
        None
    }
}

#[derive(Debug, Error)]
pub enum TopicError {
    #[error("failed to read topic file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse topic file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("topic file {path} contains no topics")]
    Empty { path: PathBuf },
}

/// Fixed in-memory rotation, cycled in order. Used when no topic file is
/// configured, and as a test double.
pub struct StaticTopics {
    rotation: Vec<Topic>,
    cursor: usize,
}

impl StaticTopics {
    pub fn new(rotation: Vec<Topic>) -> Self {
        Self {
            rotation,
            cursor: 0,
        }
    }

    pub fn builtin() -> Self {
        let titles = [
            "What's on your mind right now?",
            "Best thing you read this week?",
            "One small thing that made today better",
            "A place you'd go back to tomorrow",
        ];
        Self::new(
            titles
                .iter()
                .map(|t| Topic {
                    title: (*t).to_string(),
                    url: None,
                })
                .collect(),
        )
    }
}

impl TopicSource for StaticTopics {
    fn next_topic(&mut self) -> Topic {
        let Some(topic) = self.rotation.get(self.cursor) else {
            return Topic::placeholder();
        };
        self.cursor = (self.cursor + 1) % self.rotation.len();
        topic.clone()
    }
}

/// File-backed topic source: a JSON array of topics cycled in order, with
/// an optional manual queue consumed first.
pub struct TopicFile {
    rotation: Vec<Topic>,
    cursor: usize,
    manual: VecDeque<Topic>,
}

impl TopicFile {
    pub fn load(path: &Path, manual_path: Option<&Path>) -> Result<Self, TopicError> {
        let rotation = read_topics(path)?;
        if rotation.is_empty() {
            return Err(TopicError::Empty {
                path: path.to_path_buf(),
            });
        }
        let manual = match manual_path {
            Some(p) if p.exists() => read_topics(p)?.into(),
            _ => VecDeque::new(),
        };
        Ok(Self {
            rotation,
            cursor: 0,
            manual,
        })
    }
}

impl TopicSource for TopicFile {
    fn next_topic(&mut self) -> Topic {
        if let Some(topic) = self.manual.pop_front() {
            return topic;
        }
        let topic = self.rotation[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.rotation.len();
        topic
    }
}

fn read_topics(path: &Path) -> Result<Vec<Topic>, TopicError> {
    let raw = std::fs::read_to_string(path).map_err(|source| TopicError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| TopicError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Duration until the next quarter-hour boundary (minutes 0, 15, 30, 45).
///
/// Millisecond precision so a wake-up just shy of a boundary never
/// produces a zero-length sleep and a double fire.
pub fn until_next_rotation<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    const QUARTER_MS: u64 = 15 * 60 * 1000;
    let into_ms = u64::from((now.minute() % 15) * 60 + now.second()) * 1000
        + u64::from(now.timestamp_subsec_millis());
    let remaining = QUARTER_MS - into_ms.min(QUARTER_MS);
    if remaining == 0 {
        Duration::from_millis(QUARTER_MS)
    } else {
        Duration::from_millis(remaining)
    }
}
