//! Server configuration, parsed from CLI flags and environment.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "shoutwall-server", about = "Real-time broadcast hub")]
pub struct ServerConfig {
    /// Address for the HTTP/WebSocket listener.
    #[arg(long, default_value = "127.0.0.1:3000", env = "SHOUTWALL_LISTEN")]
    pub listen_addr: String,

    /// JSON file holding the topic rotation (array of {title, url?}).
    /// Falls back to a built-in rotation when unset.
    #[arg(long, env = "SHOUTWALL_TOPICS")]
    pub topics_file: Option<PathBuf>,

    /// JSON file of operator-queued topics, consumed ahead of the rotation.
    #[arg(long)]
    pub manual_topics_file: Option<PathBuf>,

    /// Directory of static web client files to serve at /.
    #[arg(long)]
    pub static_dir: Option<String>,

    /// Maximum simultaneous connections from one network address.
    #[arg(long, default_value_t = 3)]
    pub max_conns_per_addr: u32,
}

impl Default for ServerConfig {
    /// Defaults without touching the process argv (used by tests).
    fn default() -> Self {
        Self::parse_from(["shoutwall-server"])
    }
}
