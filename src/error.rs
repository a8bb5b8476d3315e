use crate::client::Person;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
}

/// Failures while turning frames into data URLs and back
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Encoded image has no recognizable data URL header")]
    MissingHeader,

    #[error("Encoded image payload is not valid base64: {details}")]
    InvalidPayload { details: String },

    #[error("Aspect ratio must be a positive finite number, got {ratio}")]
    InvalidAspectRatio { ratio: f64 },

    #[error("Frame could not be decoded: {details}")]
    FrameDecode { details: String },

    #[error("JPEG encoding failed: {details}")]
    JpegEncoding { details: String },
}

/// Why a capture device could not be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    Permission,
    NotFound,
    NotReadable,
    Other,
}

impl DeviceErrorKind {
    /// Title and description shown to the user
    pub fn user_message(&self) -> (&'static str, &'static str) {
        match self {
            DeviceErrorKind::Permission => (
                "Camera permission denied",
                "Access to the camera was denied. Allow camera access and try again.",
            ),
            DeviceErrorKind::NotFound => (
                "No camera found",
                "No camera was detected on this device. You can upload an image instead.",
            ),
            DeviceErrorKind::NotReadable => (
                "Camera unavailable",
                "The camera is in use by another application. Close it and try again.",
            ),
            DeviceErrorKind::Other => (
                "Camera error",
                "An error occurred while accessing the camera. You can upload an image instead.",
            ),
        }
    }
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceErrorKind::Permission => "permission",
            DeviceErrorKind::NotFound => "not-found",
            DeviceErrorKind::NotReadable => "not-readable",
            DeviceErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Device error ({kind}): {details}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub details: String,
}

impl DeviceError {
    pub fn new<S: Into<String>>(kind: DeviceErrorKind, details: S) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Action '{action}' is not allowed while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Frame grab failed: {details}")]
    FrameGrab { details: String },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// File import rejections
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Unsupported format: {mime}")]
    UnsupportedFormat { mime: String },

    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Failed to read file: {details}")]
    Read { details: String },
}

impl ImportError {
    pub fn user_message(&self) -> (&'static str, String) {
        match self {
            ImportError::UnsupportedFormat { .. } => (
                "Unsupported format",
                "Please select an image (JPG, PNG, etc).".to_string(),
            ),
            ImportError::FileTooLarge { limit, .. } => (
                "File too large",
                format!(
                    "The maximum allowed size is {} MB.",
                    limit / (1024 * 1024)
                ),
            ),
            ImportError::Read { details } => ("Could not read file", details.clone()),
        }
    }
}

/// Remote collection failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Person not found: {id}")]
    NotFound { id: String },

    #[error("Error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Status code of the failed call, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Missing required field: {field}")]
    Validation { field: &'static str },

    #[error("Another save is still in progress")]
    Busy,

    #[error("No stored photo can be deleted in the current state")]
    PhotoNotDeletable,

    #[error(transparent)]
    Remote(#[from] ApiError),

    /// Fields were saved but the photo was not
    #[error("Saved fields of {} but the photo update failed: {source}", person.id)]
    PartialFailure { person: Box<Person>, source: ApiError },
}

pub type Result<T> = std::result::Result<T, RollcallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_into_crate_error() {
        let err: RollcallError = ApiError::NotFound {
            id: "p1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "API error: Person not found: p1");

        let err: RollcallError = EditorError::Busy.into();
        assert!(matches!(err, RollcallError::Editor(EditorError::Busy)));

        let capture: CaptureError = DeviceError::new(DeviceErrorKind::Permission, "denied").into();
        assert_eq!(capture.to_string(), "Device error (permission): denied");
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::NotFound {
                id: "x".to_string()
            }
            .status(),
            Some(404)
        );
        assert_eq!(ApiError::Transport("refused".to_string()).status(), None);
        assert!(!ApiError::Decode("bad".to_string()).is_not_found());
    }

    #[test]
    fn test_import_user_messages() {
        let (title, description) = ImportError::FileTooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        }
        .user_message();
        assert_eq!(title, "File too large");
        assert_eq!(description, "The maximum allowed size is 5 MB.");

        let (title, _) = DeviceErrorKind::NotReadable.user_message();
        assert_eq!(title, "Camera unavailable");
    }
}
