//! Microsoft Teams bot that forwards data questions to a Databricks Genie space.

pub mod activity;
pub mod bot;
pub mod commands;
pub mod config;
pub mod connector;
pub mod feedback;
pub mod http;
pub mod turn;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use genie_client::{DirectFeedbackClient, FeedbackRoute, GenieClient, GenieGateway, GenieSettings};
use genie_session::{SessionManager, shared_feedback_store, shared_memory_store};

pub use bot::{GenieBot, InvokeResponse};
pub use config::BotConfig;
pub use http::{AppState, router};

use connector::ConnectorClient;
use feedback::FeedbackRelay;

/// Wires the Genie client, stores and connector from `config`.
pub fn build_state(config: &BotConfig) -> Result<AppState> {
    let http = reqwest::Client::builder()
        .build()
        .context("building http client")?;

    let genie = &config.genie;
    let settings = GenieSettings::new(genie.host.clone(), genie.token.clone())
        .with_capabilities(genie.capabilities);
    let client = GenieClient::new(http.clone(), settings).context("configuring genie client")?;
    let mut gateway = GenieGateway::new(Arc::new(client), genie.space_id.clone());
    if genie.capabilities.feedback == FeedbackRoute::DirectHttp {
        let direct = DirectFeedbackClient::new(http.clone(), &genie.host, genie.token.clone())
            .context("configuring direct feedback client")?;
        gateway = gateway.with_direct_feedback(direct);
    }

    let sessions = SessionManager::new(shared_memory_store());
    let relay = FeedbackRelay::new(
        sessions.clone(),
        shared_feedback_store(),
        gateway.clone(),
        config.feedback.api_enabled,
    );
    let bot = GenieBot::new(
        sessions,
        gateway,
        relay,
        config.feedback.clone(),
        config.sample_questions.clone(),
    );

    info!(
        space_id = %genie.space_id,
        local_auth = config.auth.is_local(),
        feedback_cards = config.feedback.cards_enabled,
        feedback_api = config.feedback.api_enabled,
        "bot configured"
    );
    Ok(AppState {
        bot: Arc::new(bot),
        sender: Arc::new(ConnectorClient::new(http, config.auth.clone())),
    })
}
