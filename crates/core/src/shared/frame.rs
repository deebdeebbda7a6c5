use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Prefix of the data URIs produced by camera snapshots.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[source] base64::DecodeError),
    #[error("pixel buffer does not match {width}x{height} RGB")]
    BufferSize { width: u32, height: u32 },
    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// A single camera snapshot, held as encoded JPEG bytes.
///
/// The wire format is base64 without the data-URI prefix; callers that
/// display the frame use [`Frame::to_data_uri`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    jpeg: Vec<u8>,
    index: usize,
}

impl Frame {
    pub fn new(jpeg: Vec<u8>, index: usize) -> Self {
        Self { jpeg, index }
    }

    /// Encodes row-major RGB pixels as a JPEG frame.
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        quality: u8,
        index: usize,
    ) -> Result<Self, FrameError> {
        let img = image::RgbImage::from_raw(width, height, data)
            .ok_or(FrameError::BufferSize { width, height })?;

        let mut jpeg = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), quality);
        img.write_with_encoder(encoder)
            .map_err(FrameError::Encode)?;

        Ok(Self { jpeg, index })
    }

    /// Parses a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str, index: usize) -> Result<Self, FrameError> {
        let (header, payload) = uri.split_once(',').ok_or(FrameError::NotDataUri)?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(FrameError::NotDataUri);
        }
        let jpeg = STANDARD.decode(payload).map_err(FrameError::Base64)?;
        Ok(Self { jpeg, index })
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Base64 payload without any data-URI prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }

    pub fn to_data_uri(&self) -> String {
        format!("{JPEG_DATA_URI_PREFIX}{}", self.to_base64())
    }
}
