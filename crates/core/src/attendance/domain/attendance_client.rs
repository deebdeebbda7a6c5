use std::future::Future;

use thiserror::Error;

use crate::attendance::domain::attendance_record::AttendanceRecord;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("attendance service unreachable: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("check-in rejected (HTTP {status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },
    #[error("malformed attendance response: {0}")]
    Malformed(String),
}

/// Submits a captured frame as an attendance check-in.
pub trait AttendanceClient: Send + Sync {
    fn check_in(
        &self,
        frame: &Frame,
    ) -> impl Future<Output = Result<AttendanceRecord, AttendanceError>> + Send;
}
