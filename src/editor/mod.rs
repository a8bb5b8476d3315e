//! Create/edit form state and its submission policy.

mod draft;
mod machine;


pub use draft::{DraftRecord, PhotoDraft};
pub use machine::{EditorMode, RecordEditor, SubmitOutcome};
