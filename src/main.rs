use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use edge_rate_limiter::app;
use edge_rate_limiter::clock::SystemClock;
use edge_rate_limiter::config::Args;
use edge_rate_limiter::models::Category;
use edge_rate_limiter::rate_limit::RateLimiter;
use edge_rate_limiter::state::AppState;
use edge_rate_limiter::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let limits = args.limits()?;

    let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), limits)
        .with_sweep_probability(args.sweep_probability);
    let state = Arc::new(AppState::new(limiter));

    for category in Category::ALL {
        let config = state.limiter.limits().get(category);
        info!(
            %category,
            max_requests = config.max_requests,
            window_secs = config.window.num_seconds(),
            "rate limit configured"
        );
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "rate limiter listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("rate limiter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
