//! Data URL encoding of captured photos.
//!
//! Captured frames are center-cropped to a fixed aspect ratio, encoded as
//! JPEG and carried around as `data:<mime>;base64,<payload>` strings until
//! they are uploaded, at which point they are decoded back to raw bytes.

use crate::error::EncodingError;
use crate::frame::FrameData;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops;
use std::fmt;
use tracing::debug;

/// Mime type of every camera capture
pub const CAPTURE_MIME: &str = "image/jpeg";

/// Default JPEG quality for captures
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Region of a frame, in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest region with the given width/height ratio, centered in the frame
pub fn center_crop(
    frame_width: u32,
    frame_height: u32,
    ratio: f64,
) -> Result<CropRegion, EncodingError> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(EncodingError::InvalidAspectRatio { ratio });
    }
    if frame_width == 0 || frame_height == 0 {
        return Err(EncodingError::FrameDecode {
            details: format!("empty frame ({}x{})", frame_width, frame_height),
        });
    }

    let fw = frame_width as f64;
    let fh = frame_height as f64;

    let mut width = fw;
    let mut height = fw / ratio;
    if height > fh {
        height = fh;
        width = fh * ratio;
    }

    let width = (width.round() as u32).clamp(1, frame_width);
    let height = (height.round() as u32).clamp(1, frame_height);

    Ok(CropRegion {
        x: (frame_width - width) / 2,
        y: (frame_height - height) / 2,
        width,
        height,
    })
}

/// A `data:<mime>;base64,<payload>` string known to have a valid header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// Validate an existing data URL
    pub fn parse<S: Into<String>>(data_url: S) -> Result<Self, EncodingError> {
        let data_url = data_url.into();
        split_data_url(&data_url)?;
        Ok(Self(data_url))
    }

    /// Build a data URL around raw bytes
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!(
            "data:{};base64,{}",
            mime,
            general_purpose::STANDARD.encode(bytes)
        ))
    }

    pub fn mime(&self) -> &str {
        // Header was validated on construction
        split_data_url(&self.0).map(|(mime, _)| mime).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode back to an uploadable payload
    pub fn decode(&self) -> Result<ImagePayload, EncodingError> {
        decode_to_binary(&self.0)
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads are large; show the header and size only
        write!(f, "data:{};base64,<{} chars>", self.mime(), self.0.len())
    }
}

/// Binary image ready for a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// File name used for the multipart part
    pub fn file_name(&self) -> String {
        let extension = match self.mime.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "jpg",
        };
        format!("photo.{}", extension)
    }
}

fn split_data_url(data_url: &str) -> Result<(&str, &str), EncodingError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or(EncodingError::MissingHeader)?;
    let mime = header
        .strip_prefix("data:")
        .and_then(|rest| rest.strip_suffix(";base64"))
        .ok_or(EncodingError::MissingHeader)?;
    if mime.is_empty() || !mime.contains('/') {
        return Err(EncodingError::MissingHeader);
    }
    Ok((mime, payload))
}

/// Crop `frame` to `ratio` around its center and encode it as a JPEG data URL
pub fn encode_frame_region(
    frame: &FrameData,
    ratio: f64,
    quality: u8,
) -> Result<EncodedImage, EncodingError> {
    let region = center_crop(frame.width, frame.height, ratio)?;
    let rgb = frame.to_rgb_image()?;

    let cropped = imageops::crop_imm(&rgb, region.x, region.y, region.width, region.height)
        .to_image();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(&cropped)
        .map_err(|e| EncodingError::JpegEncoding {
            details: e.to_string(),
        })?;

    debug!(
        "Encoded frame {} region {}x{}+{}+{} ({} JPEG bytes)",
        frame.id,
        region.width,
        region.height,
        region.x,
        region.y,
        jpeg.len()
    );

    Ok(EncodedImage::from_bytes(CAPTURE_MIME, &jpeg))
}

/// Split a data URL into its declared mime type and decoded bytes
pub fn decode_to_binary(data_url: &str) -> Result<ImagePayload, EncodingError> {
    let (mime, payload) = split_data_url(data_url)?;
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| EncodingError::InvalidPayload {
            details: e.to_string(),
        })?;

    Ok(ImagePayload {
        mime: mime.to_string(),
        bytes,
    })
}
