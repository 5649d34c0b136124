//! boxoffice — event ticketing backend
//!
//! Long-running service that:
//! - Manages the event catalog and per-event ticket ledger
//! - Opens Stripe payment intents and tracks payment attempts
//! - Reconciles gateway webhooks into exactly-once ticket reservations
//! - Sweeps stale PENDING attempts in the background

use boxoffice::api;
use boxoffice::config::Config;
use boxoffice::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting boxoffice (env: {})", config.environment);

    // Initialize application state (connects Postgres, runs migrations)
    let state = AppState::new(&config).await?;

    let app = api::create_router(state.clone());

    // Periodic sweep of PENDING attempts that never confirmed (every 5 minutes)
    let settlement = state.settlement.clone();
    let ttl_ms = config.pending_ttl_minutes * 60_000;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            if let Err(e) = settlement.expire_stale(ttl_ms).await {
                tracing::error!(error = ?e, "stale attempt sweep failed");
            }
        }
    });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("boxoffice HTTP listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
