//! Shared hub state, server wiring, and the topic schedulers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::fanout::{self, ServerEvent};
use crate::registry::{ConnId, Registry};
use crate::topics::{self, StaticTopics, Topic, TopicFile, TopicSource};

/// State shared by every connection task and the schedulers. All core
/// state is in-memory and rebuilt from nothing on restart.
pub struct SharedState {
    pub config: ServerConfig,
    /// Live-connection registry: rate windows, address counts, presence.
    pub registry: Mutex<Registry>,
    /// id -> outbound event queue for that connection.
    pub peers: Mutex<HashMap<ConnId, mpsc::Sender<ServerEvent>>>,
    /// The single process-wide topic, overwritten on each rotation.
    pub current_topic: Mutex<Topic>,
    topic_source: Mutex<Box<dyn TopicSource>>,
}

impl SharedState {
    pub fn new(config: ServerConfig, source: Box<dyn TopicSource>) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Registry::new(config.max_conns_per_addr)),
            peers: Mutex::new(HashMap::new()),
            current_topic: Mutex::new(Topic::placeholder()),
            topic_source: Mutex::new(source),
            config,
        })
    }

    /// Fetch the next topic, install it as current, and announce it to
    /// everyone. Safe under overlapping triggers: each call is independent
    /// and the last installed topic wins.
    pub fn rotate_topic(&self) {
        let topic = self.topic_source.lock().next_topic();
        *self.current_topic.lock() = topic.clone();
        tracing::info!(title = %topic.title, "new topic");
        fanout::broadcast_topic(self, topic);
    }
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run the hub, blocking forever.
    pub async fn run(self) -> Result<()> {
        let mut source = self.build_source()?;
        let push_ticks = source.schedule_ticks();
        let state = SharedState::new(self.config.clone(), source);

        // Wall-clock trigger: minutes 0, 15, 30, 45 of every hour.
        {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                loop {
                    let wait = topics::until_next_rotation(Local::now());
                    tokio::time::sleep(wait).await;
                    state.rotate_topic();
                }
            });
        }

        // Push trigger from the topic source, if it provides one. Both
        // triggers converge on the same rotate action.
        if let Some(mut ticks) = push_ticks {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                while ticks.recv().await.is_some() {
                    state.rotate_topic();
                }
            });
        }

        let router = crate::web::router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.listen_addr))?;
        tracing::info!("listening on {}", self.config.listen_addr);
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    fn build_source(&self) -> Result<Box<dyn TopicSource>> {
        match &self.config.topics_file {
            Some(path) => {
                let source = TopicFile::load(path, self.config.manual_topics_file.as_deref())
                    .context("failed to load topic rotation")?;
                tracing::info!(path = %path.display(), "loaded topic rotation");
                Ok(Box::new(source))
            }
            None => {
                tracing::info!("no topic file configured, using built-in rotation");
                Ok(Box::new(StaticTopics::builtin()))
            }
        }
    }
}
