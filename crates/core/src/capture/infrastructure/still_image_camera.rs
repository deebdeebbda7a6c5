use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::capture::domain::frame_source::{CameraDevice, CaptureError, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Device id used when images sit directly in the camera root.
pub const DEFAULT_DEVICE_ID: &str = "default";

/// Adapts directories of still images to the [`FrameSource`] interface.
///
/// Every sub-directory of `root` that contains images is one device; images
/// placed directly in `root` form the `default` device. Selecting a device
/// decodes its images once and re-encodes them as JPEG frames; grabs cycle
/// through that cache, so headless runs and tests can drive the
/// verification loop without a physical camera.
pub struct StillImageCamera {
    root: PathBuf,
    quality: u8,
    state: Mutex<CameraState>,
}

#[derive(Default)]
struct CameraState {
    selected: Option<String>,
    frames: Vec<Frame>,
    cursor: usize,
    next_index: usize,
}

impl StillImageCamera {
    /// Opens a camera root and selects its first device, if any.
    pub fn open(root: &Path, quality: u8) -> Result<Self, CaptureError> {
        let camera = Self {
            root: root.to_path_buf(),
            quality,
            state: Mutex::new(CameraState::default()),
        };
        if let Some(first) = camera.list_devices()?.into_iter().next() {
            log::info!("Camera: selected {} ({})", first.label, first.id);
            camera.select_device(&first.id)?;
        }
        Ok(camera)
    }

    pub fn selected_device(&self) -> Option<String> {
        self.lock_state().selected.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device_dir(&self, id: &str) -> PathBuf {
        if id == DEFAULT_DEVICE_ID {
            self.root.clone()
        } else {
            self.root.join(id)
        }
    }

    /// Decodes every readable image of a device into a JPEG frame.
    fn load_frames(&self, dir: &Path) -> Result<Vec<Frame>, CaptureError> {
        let files = image_files(dir).map_err(CaptureError::Enumeration)?;
        let mut frames = Vec::with_capacity(files.len());
        for path in &files {
            let img = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    log::warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };
            let (width, height) = img.dimensions();
            match Frame::from_rgb(img.into_raw(), width, height, self.quality, frames.len()) {
                Ok(frame) => frames.push(frame),
                Err(e) => log::warn!("Skipping {}: {e}", path.display()),
            }
        }
        log::debug!("Camera: cached {} frames from {}", frames.len(), dir.display());
        Ok(frames)
    }
}

impl FrameSource for StillImageCamera {
    fn grab_frame(&self) -> Option<Frame> {
        let mut state = self.lock_state();
        let id = state.selected.clone()?;
        if state.frames.is_empty() {
            return None;
        }
        // An unplugged camera stops delivering frames.
        if !self.device_dir(&id).is_dir() {
            log::warn!("Camera {id} unavailable");
            return None;
        }

        let cached = &state.frames[state.cursor % state.frames.len()];
        let frame = Frame::new(cached.jpeg().to_vec(), state.next_index);
        state.cursor = state.cursor.wrapping_add(1);
        state.next_index += 1;
        Some(frame)
    }

    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        let entries = fs::read_dir(&self.root).map_err(CaptureError::Enumeration)?;

        let mut devices = Vec::new();
        let mut has_loose_images = false;
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                let has_images = image_files(&path)
                    .map(|files| !files.is_empty())
                    .unwrap_or(false);
                if has_images {
                    let id = entry.file_name().to_string_lossy().into_owned();
                    devices.push(CameraDevice {
                        label: id.clone(),
                        id,
                    });
                }
            } else if is_image(&path) {
                has_loose_images = true;
            }
        }
        devices.sort_by(|a, b| a.id.cmp(&b.id));

        if has_loose_images {
            let label = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
            devices.insert(
                0,
                CameraDevice {
                    id: DEFAULT_DEVICE_ID.to_string(),
                    label,
                },
            );
        }
        Ok(devices)
    }

    fn select_device(&self, id: &str) -> Result<(), CaptureError> {
        if !self.list_devices()?.iter().any(|d| d.id == id) {
            return Err(CaptureError::DeviceNotFound(id.to_string()));
        }
        let frames = self.load_frames(&self.device_dir(id))?;

        let mut state = self.lock_state();
        state.selected = Some(id.to_string());
        state.frames = frames;
        state.cursor = 0;
        log::info!("Camera: switched to {id}");
        Ok(())
    }
}

fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
