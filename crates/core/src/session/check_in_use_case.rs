use std::time::Duration;

use thiserror::Error;

use crate::attendance::domain::attendance_client::{AttendanceClient, AttendanceError};
use crate::attendance::domain::attendance_record::AttendanceRecord;
use crate::session::verification_session::SessionHandle;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CheckInError {
    #[error("no stable face within {0:?}")]
    TimedOut(Duration),
    #[error("verification session ended before a capture")]
    SessionEnded,
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}

/// The frame that was submitted and the record the backend created for it.
#[derive(Clone, Debug)]
pub struct CheckIn {
    pub frame: Frame,
    pub record: AttendanceRecord,
}

/// Check-in flow: verify → capture → pause polling → submit → close.
pub struct CheckInUseCase<A: AttendanceClient> {
    client: A,
    timeout: Option<Duration>,
}

impl<A: AttendanceClient> CheckInUseCase<A> {
    pub fn new(client: A, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    /// Opens the session, waits for a captured frame and submits it.
    ///
    /// Polling stays paused while the submission runs. On success the
    /// session is closed; on a rejected submission it is left captured so
    /// the caller can retake.
    pub async fn execute(&self, session: &mut SessionHandle) -> Result<CheckIn, CheckInError> {
        session.open();

        let frame = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, session.next_capture())
                .await
                .map_err(|_| CheckInError::TimedOut(limit))?,
            None => session.next_capture().await,
        }
        .ok_or(CheckInError::SessionEnded)?;

        log::info!("Submitting check-in with frame {}", frame.index());
        session.set_checking(true);
        let result = self.client.check_in(&frame).await;
        session.set_checking(false);

        let record = result?;
        session.close();
        Ok(CheckIn { frame, record })
    }
}
