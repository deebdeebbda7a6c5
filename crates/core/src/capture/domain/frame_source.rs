use thiserror::Error;

use crate::shared::frame::Frame;

/// A selectable camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to enumerate camera devices: {0}")]
    Enumeration(#[source] std::io::Error),
}

/// Domain interface for camera access.
///
/// Shared between the polling loop and manual capture, so methods take
/// `&self`; implementations use interior mutability for device selection.
pub trait FrameSource: Send + Sync {
    /// Snapshot of the current video buffer. Never blocks.
    ///
    /// Returns `None` while the stream is still initializing or after the
    /// device went away.
    fn grab_frame(&self) -> Option<Frame>;

    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError>;

    /// Switches the active device. Detection state is unaffected.
    fn select_device(&self, id: &str) -> Result<(), CaptureError>;
}
