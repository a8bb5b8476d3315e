use crate::error::EncodingError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A single frame grabbed from a live video stream
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame counter within the stream
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Wrap an already decoded image as an RGB24 frame
    pub fn from_rgb_image(id: u64, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(
            id,
            SystemTime::now(),
            image.into_raw(),
            width,
            height,
            FrameFormat::Rgb24,
        )
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }

    /// Decode the frame into an RGB buffer for cropping
    pub fn to_rgb_image(&self) -> Result<RgbImage, EncodingError> {
        match self.format {
            FrameFormat::Mjpeg => {
                let decoded = image::load_from_memory(&self.data).map_err(|e| {
                    EncodingError::FrameDecode {
                        details: format!("JPEG decode failed for frame {}: {}", self.id, e),
                    }
                })?;
                Ok(decoded.to_rgb8())
            }
            FrameFormat::Rgb24 => {
                if !self.validate_size() {
                    return Err(EncodingError::FrameDecode {
                        details: format!(
                            "Frame {} has {} bytes, expected {} for {}x{} RGB24",
                            self.id,
                            self.data.len(),
                            self.expected_size().unwrap_or_default(),
                            self.width,
                            self.height
                        ),
                    });
                }
                RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone()).ok_or_else(
                    || EncodingError::FrameDecode {
                        details: format!("Frame {} buffer does not match its size", self.id),
                    },
                )
            }
        }
    }
}
