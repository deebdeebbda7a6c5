use std::future::Future;

use serde::Serialize;

use crate::attendance::domain::attendance_client::{AttendanceClient, AttendanceError};
use crate::attendance::domain::attendance_record::AttendanceRecord;
use crate::shared::api_error::detail_from_body;
use crate::shared::constants::ATTENDANCE_CHECK_IN_PATH;
use crate::shared::frame::Frame;

#[derive(Serialize)]
struct CheckInRequest<'a> {
    image: &'a str,
}

/// [`AttendanceClient`] backed by `POST /attendance/check-in`.
pub struct HttpAttendanceClient {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl HttpAttendanceClient {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                ATTENDANCE_CHECK_IN_PATH
            ),
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }
}

impl AttendanceClient for HttpAttendanceClient {
    fn check_in(
        &self,
        frame: &Frame,
    ) -> impl Future<Output = Result<AttendanceRecord, AttendanceError>> + Send {
        let image = frame.to_base64();
        async move {
            let mut builder = self
                .client
                .post(&self.url)
                .json(&CheckInRequest { image: &image });
            if let Some(token) = &self.access_token {
                builder = builder.bearer_auth(token);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| AttendanceError::Transport(Box::new(e)))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(AttendanceError::Rejected {
                    status: status.as_u16(),
                    detail: detail_from_body(&text),
                });
            }

            response
                .json::<AttendanceRecord>()
                .await
                .map_err(|e| AttendanceError::Malformed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    const RECORD: &str = r#"{"id":12,"userId":4,"userName":"Lee","organizationType":"company",
        "checkInTime":"2025-03-02T09:01:00+09:00","similarity":0.77,"status":"checked_in",
        "createdAt":"2025-03-02T09:01:00+09:00"}"#;

    #[tokio::test]
    async fn test_check_in_posts_bare_base64() {
        let (base, server) = serve_once(201, RECORD).await;
        let client = HttpAttendanceClient::new(&base, Some("tok".into()));

        let record = client
            .check_in(&Frame::new(b"abc".to_vec(), 0))
            .await
            .unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.status, "checked_in");

        let captured = server.await.unwrap();
        assert!(captured.head.starts_with("POST /attendance/check-in "));
        assert_eq!(captured.header("authorization").as_deref(), Some("Bearer tok"));
        assert_eq!(captured.json(), serde_json::json!({ "image": "YWJj" }));
    }

    #[tokio::test]
    async fn test_failed_verification_surfaces_detail() {
        let (base, _server) =
            serve_once(401, r#"{"detail":"Face verification failed. (similarity: 0.41)"}"#).await;
        let client = HttpAttendanceClient::new(&base, None);

        let err = client
            .check_in(&Frame::new(b"abc".to_vec(), 0))
            .await
            .unwrap_err();
        match err {
            AttendanceError::Rejected { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(
                    detail.as_deref(),
                    Some("Face verification failed. (similarity: 0.41)")
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_record() {
        let (base, _server) = serve_once(201, r#"{"id":"x"}"#).await;
        let client = HttpAttendanceClient::new(&base, None);

        let err = client
            .check_in(&Frame::new(b"abc".to_vec(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Malformed(_)));
    }
}
