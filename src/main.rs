use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_image_proxy::{
    config::Config,
    feed::FeedService,
    proxy::ImageProxyService,
    resolver::ResolverService,
    utils::HttpFetcher,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "listing-image-proxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Image resolution and proxy service for real-estate listings")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("listing_image_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("listing_image_proxy={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Listing Image Proxy v{}",
        env!("CARGO_PKG_VERSION")
    );

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    info!("Upstream feed: {}", config.upstream.feed_url);
    if config.probe.enabled {
        info!("Storage probe enabled: {}", config.probe.storage_base_url);
    }

    let fetcher = HttpFetcher::new(
        &config.upstream.user_agent,
        Duration::from_secs(config.upstream.request_timeout_secs),
    )?;
    let feed = FeedService::new(
        fetcher.clone(),
        config.upstream.feed_url.clone(),
        Duration::from_secs(config.cache.feed_ttl_secs),
    );
    let resolver = ResolverService::new(&config, feed.clone(), fetcher)?;
    let proxy = ImageProxyService::new(&config.proxy, &config.upstream.user_agent)?;

    let server = WebServer::new(config, resolver, feed, proxy)?;
    info!(
        "Web server listening on http://{}:{}",
        server.host(),
        server.port()
    );
    server.serve().await
}
