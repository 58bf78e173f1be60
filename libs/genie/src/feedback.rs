use metrics::counter;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::{info, warn};

use crate::client::{feedback_path, workspace_base_url};
use crate::error::GenieError;
use crate::types::FeedbackRating;

/// Posts feedback straight to the workspace REST endpoint.
///
/// Only an exact `200 OK` counts as success.
#[derive(Clone)]
pub struct DirectFeedbackClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DirectFeedbackClient {
    pub fn new(http: Client, host: &str, token: impl Into<String>) -> Result<Self, GenieError> {
        Ok(Self {
            http,
            base_url: workspace_base_url(host)?,
            token: token.into(),
        })
    }

    pub async fn submit(
        &self,
        space_id: &str,
        conversation_id: &str,
        message_id: &str,
        rating: FeedbackRating,
    ) -> Result<(), GenieError> {
        let url = self
            .base_url
            .join(&feedback_path(space_id, conversation_id, message_id))
            .map_err(|err| GenieError::Config(err.to_string()))?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "rating": rating }))
            .send()
            .await
            .map_err(GenieError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            counter!("genie_feedback_total", "route" => "http", "outcome" => "error").increment(1);
            warn!(%status, message_id, "direct feedback rejected");
            return Err(GenieError::Remote { status, message });
        }

        counter!("genie_feedback_total", "route" => "http", "outcome" => "ok").increment(1);
        info!(message_id, rating = rating.as_str(), "feedback sent over http");
        Ok(())
    }
}
