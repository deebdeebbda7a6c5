use std::time::Duration;

/// Minimum similarity (percent) for an observation to count towards capture.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 70.0;

/// Consecutive positive observations required before auto-capture.
pub const DEFAULT_REQUIRED_HITS: u32 = 2;

/// Delay after a scorer round-trip settles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Delay when no frame was available or a request is still in flight.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Matches the browser screenshot default of 0.92.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

pub const CHECK_IN_PREVIEW_PATH: &str = "/face/verify-preview";
pub const ADMIN_PREVIEW_PATH: &str = "/admin/face-preview";
pub const ATTENDANCE_CHECK_IN_PATH: &str = "/attendance/check-in";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const MSG_SIMILARITY_CHECK_FAILED: &str = "An error occurred while checking similarity.";
pub const MSG_SIMILARITY_PREVIEW_FAILED: &str = "Failed to compute similarity.";
pub const MSG_USER_ID_REQUIRED: &str = "Please enter a user ID.";
pub const MSG_CAMERA_UNAVAILABLE: &str = "Could not get an image from the camera.";
