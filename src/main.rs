use anyhow::{Context, Result};
use autodecx_capture::{create_router, AppState, Config};
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "autodecx-capture", about = "AutoDecX sound capture service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/autodecx")]
    config: String,

    /// Override the HTTP port from the configuration file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("analysis backend: {}", cfg.analysis.base_url);
    info!(
        "capture: max {}s, tick {}ms, pre-roll {}s",
        cfg.capture.max_duration_secs, cfg.capture.tick_interval_ms, cfg.capture.pre_roll_secs
    );

    let state = AppState::new(&cfg)?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
