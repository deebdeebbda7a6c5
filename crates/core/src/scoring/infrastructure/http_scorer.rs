use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::scoring::domain::scorer::{ScoreError, ScoreRequest, Scorer};
use crate::shared::api_error::detail_from_body;
use crate::shared::constants::{ADMIN_PREVIEW_PATH, CHECK_IN_PREVIEW_PATH};
use crate::shared::observation::Observation;

/// Which backend preview endpoint to score against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreEndpoint {
    /// Compares against the logged-in user; reports face presence.
    CheckIn,
    /// Compares against the given admin account; no face-presence signal.
    AdminLogin,
}

impl ScoreEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            ScoreEndpoint::CheckIn => CHECK_IN_PREVIEW_PATH,
            ScoreEndpoint::AdminLogin => ADMIN_PREVIEW_PATH,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    image: &'a str,
}

#[derive(Deserialize)]
struct PreviewResponse {
    similarity: f64,
    verified: bool,
    #[serde(default)]
    detected: Option<bool>,
}

/// [`Scorer`] backed by the REST preview endpoints.
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl HttpScorer {
    pub fn new(base_url: &str, endpoint: ScoreEndpoint) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, endpoint)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, endpoint: ScoreEndpoint) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), endpoint.path()),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Scorer for HttpScorer {
    fn score(
        &self,
        request: ScoreRequest,
    ) -> impl Future<Output = Result<Observation, ScoreError>> + Send {
        async move {
            let body = PreviewRequest {
                user_id: request.user_id.as_deref(),
                image: &request.image,
            };
            let mut builder = self.client.post(&self.url).json(&body);
            if let Some(token) = &self.access_token {
                builder = builder.bearer_auth(token);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ScoreError::Transport(Box::new(e)))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ScoreError::Rejected {
                    status: status.as_u16(),
                    detail: detail_from_body(&text),
                });
            }

            let parsed: PreviewResponse = response
                .json()
                .await
                .map_err(|e| ScoreError::Malformed(e.to_string()))?;
            if !parsed.similarity.is_finite() {
                return Err(ScoreError::Malformed(format!(
                    "similarity is not a number: {}",
                    parsed.similarity
                )));
            }

            Ok(Observation {
                similarity: parsed.similarity,
                verified: parsed.verified,
                detected: parsed.detected.unwrap_or(true),
            })
        }
    }
}
