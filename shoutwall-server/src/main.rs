use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (SHOUTWALL_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("SHOUTWALL_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("shoutwall_server=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = shoutwall_server::config::ServerConfig::parse();
    tracing::info!("starting broadcast hub on {}", config.listen_addr);
    if let Some(ref dir) = config.static_dir {
        tracing::info!("static files enabled from {dir}");
    }

    let server = shoutwall_server::server::Server::new(config);
    server.run().await
}
