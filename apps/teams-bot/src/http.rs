use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use thiserror::Error;
use tracing::{Instrument, error, warn};

use genie_telemetry::TurnLabels;

use crate::activity::Activity;
use crate::bot::GenieBot;
use crate::connector::ActivitySender;
use crate::turn::TurnContext;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<GenieBot>,
    pub sender: Arc<dyn ActivitySender>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/messages", post(messages))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum BotHttpError {
    #[error("expected an application/json body")]
    UnsupportedMediaType,
    #[error("activity body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl IntoResponse for BotHttpError {
    fn into_response(self) -> Response {
        let status = match self {
            BotHttpError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BotHttpError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = status.as_u16(), error = %self, "rejecting inbound activity");
        status.into_response()
    }
}

async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, BotHttpError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if !is_json {
        return Err(BotHttpError::UnsupportedMediaType);
    }
    let activity: Activity = serde_json::from_slice(&body)?;

    let mut labels = TurnLabels::new(activity.kind.clone(), activity.channel_id.clone());
    if let Some(from) = activity.from.as_ref() {
        labels = labels.with_user(from.id.clone());
    }
    if let Some(conversation_id) = activity.conversation_id() {
        labels = labels.with_conversation(conversation_id);
    }
    let span = labels.span();

    let ctx = TurnContext::new(activity, state.sender.clone());
    let outcome = state.bot.on_turn(&ctx).instrument(span).await;
    let response = match outcome {
        Ok(Some(invoke)) => {
            let status =
                StatusCode::from_u16(invoke.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(invoke.body)).into_response()
        }
        Ok(None) => StatusCode::CREATED.into_response(),
        Err(err) => {
            error!(error = %err, "bot turn failed");
            StatusCode::CREATED.into_response()
        }
    };
    Ok(response)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}
