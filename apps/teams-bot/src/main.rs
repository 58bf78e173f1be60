use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use genie_teams_bot::{BotConfig, build_state, router};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    genie_telemetry::install("genie-teams-bot")?;

    let config = BotConfig::from_env()?;
    let app = router(build_state(&config)?);

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "genie-teams-bot listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
