pub mod capture;
pub mod client;
pub mod config;
pub mod editor;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod invalidation;
pub mod notify;
pub mod view;

pub use config::{ApiConfig, CaptureConfig, RollcallConfig};
pub use error::{
    ApiError, CaptureError, DeviceError, DeviceErrorKind, EditorError, EncodingError, ImportError,
    Result, RollcallError,
};
pub use capture::{
    CaptureController, CaptureDevice, CaptureEvent, CaptureState, DeviceLease, Effect,
    StreamRequest, SyntheticCamera, Transition, VideoStream,
};
pub use client::{
    photo_url_for, HttpPeopleClient, InMemoryPeopleApi, NewPerson, PeopleApi, Person,
    PersonUpdate, PhotoSource,
};
pub use editor::{DraftRecord, EditorMode, PhotoDraft, RecordEditor, SubmitOutcome};
pub use encoder::{center_crop, decode_to_binary, encode_frame_region, CropRegion, EncodedImage, ImagePayload};
pub use frame::{FrameData, FrameFormat};
pub use invalidation::Invalidation;
pub use notify::{Notification, NotificationBus, NotificationLevel};
pub use view::{CollectionView, FilterState};
