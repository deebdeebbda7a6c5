use std::future::Future;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::observation::Observation;

/// One scoring request: the frame payload plus the identity to compare with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreRequest {
    /// Base64 JPEG without a data-URI prefix.
    pub image: String,
    pub user_id: Option<String>,
}

impl ScoreRequest {
    pub fn for_frame(frame: &Frame, user_id: Option<&str>) -> Self {
        Self {
            image: frame.to_base64(),
            user_id: user_id.map(str::to_string),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("scorer unreachable: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("scorer rejected the frame (HTTP {status})")]
    Rejected { status: u16, detail: Option<String> },
    #[error("malformed scorer response: {0}")]
    Malformed(String),
}

impl ScoreError {
    /// Human-readable reason supplied by the backend, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ScoreError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Domain interface for the remote face-similarity service.
///
/// Calls may be slow and may fail; the verification loop guarantees at most
/// one outstanding call per session.
pub trait Scorer: Send + Sync + 'static {
    fn score(
        &self,
        request: ScoreRequest,
    ) -> impl Future<Output = Result<Observation, ScoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_bare_base64_and_user_id() {
        let frame = Frame::new(b"abc".to_vec(), 0);
        let request = ScoreRequest::for_frame(&frame, Some("admin01"));
        assert_eq!(request.image, "YWJj");
        assert_eq!(request.user_id.as_deref(), Some("admin01"));
    }

    #[test]
    fn test_detail_only_for_rejections() {
        let rejected = ScoreError::Rejected {
            status: 404,
            detail: Some("No registered face data.".into()),
        };
        assert_eq!(rejected.detail(), Some("No registered face data."));
        assert_eq!(ScoreError::Malformed("x".into()).detail(), None);
    }
}
