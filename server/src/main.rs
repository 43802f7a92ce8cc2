use anyhow::Result;
use axum::Router;
use clap::Parser;
use plotsim_core::SimilarityOptions;
use server::{build_app_with, ServerConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, env = "PLOTSIM_INDEX", default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Maximum (doc, term) rows read per similarity query
    #[arg(long, env = "PLOTSIM_MAX_SCAN_ROWS", default_value_t = plotsim_core::similarity::DEFAULT_MAX_SCAN_ROWS)]
    max_scan_rows: usize,
    /// Per-query timeout in milliseconds
    #[arg(long, env = "PLOTSIM_QUERY_TIMEOUT_MS", default_value_t = 30_000)]
    query_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        index_dir: args.index.clone(),
        similarity: SimilarityOptions { max_scan_rows: args.max_scan_rows },
        query_timeout: Duration::from_millis(args.query_timeout_ms),
    };
    let app: Router = build_app_with(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
