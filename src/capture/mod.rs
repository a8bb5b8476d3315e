mod controller;
mod device;
mod import;
mod state;

pub use controller::CaptureController;
pub use device::{CaptureDevice, DeviceLease, StreamRequest, SyntheticCamera, VideoStream};
pub use import::{encode_import, mime_from_path, read_image_file, validate_import};
pub use state::{CaptureEvent, CaptureState, Effect, Transition};
