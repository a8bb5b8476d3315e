use crate::encoder::EncodedImage;
use crate::error::ImportError;
use std::path::Path;
use tracing::{debug, warn};

/// Guess a mime type from a file extension
pub fn mime_from_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg" | "jfif") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Check an import candidate against the mime and size rules
pub fn validate_import(mime: &str, size: u64, limit: u64) -> Result<(), ImportError> {
    if !mime.trim().to_ascii_lowercase().starts_with("image/") {
        warn!("Rejected import with mime type '{}'", mime);
        return Err(ImportError::UnsupportedFormat {
            mime: mime.to_string(),
        });
    }

    if size > limit {
        warn!("Rejected import of {} bytes (limit {})", size, limit);
        return Err(ImportError::FileTooLarge { size, limit });
    }

    Ok(())
}

/// Validate in-memory image bytes and wrap them as a data URL
pub fn encode_import(mime: &str, bytes: &[u8], limit: u64) -> Result<EncodedImage, ImportError> {
    validate_import(mime, bytes.len() as u64, limit)?;
    Ok(EncodedImage::from_bytes(mime.trim(), bytes))
}

/// Read an image file from disk. The size is checked before reading.
pub async fn read_image_file(path: &Path, limit: u64) -> Result<EncodedImage, ImportError> {
    let mime = mime_from_path(path);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ImportError::Read {
            details: format!("{}: {}", path.display(), e),
        })?;

    validate_import(mime, metadata.len(), limit)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| ImportError::Read {
        details: format!("{}: {}", path.display(), e),
    })?;

    debug!("Read {} bytes of {} from {}", bytes.len(), mime, path.display());
    encode_import(mime, &bytes, limit)
}
