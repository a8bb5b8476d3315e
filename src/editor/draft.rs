use crate::client::{NewPerson, Person, PersonUpdate};
use crate::encoder::EncodedImage;
use crate::error::EditorError;

/// What the form intends to do with the photo
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PhotoDraft {
    /// Leave whatever the server has
    #[default]
    Untouched,
    /// The user discarded the staged photo (or the stored one was deleted)
    Cleared,
    /// A newly captured or imported photo waiting to be uploaded
    Staged(EncodedImage),
}

impl PhotoDraft {
    pub fn staged(&self) -> Option<&EncodedImage> {
        match self {
            PhotoDraft::Staged(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_staged(&self) -> bool {
        self.staged().is_some()
    }
}

/// Form state of one create or edit session. Empty strings mean "unset".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftRecord {
    pub full_name: String,
    pub email: String,
    pub grade: String,
    pub group: String,
    pub photo: PhotoDraft,
}

impl DraftRecord {
    /// Load a person's fields. The stored photo is not copied.
    pub fn from_person(person: &Person) -> Self {
        Self {
            full_name: person.full_name.clone(),
            email: person.email.clone().unwrap_or_default(),
            grade: person.grade.clone().unwrap_or_default(),
            group: person.group.clone().unwrap_or_default(),
            photo: PhotoDraft::Untouched,
        }
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if self.full_name.trim().is_empty() {
            return Err(EditorError::Validation { field: "full_name" });
        }
        Ok(())
    }

    pub fn to_new_person(&self) -> NewPerson {
        NewPerson {
            full_name: self.full_name.trim().to_string(),
            email: optional(&self.email),
            grade: optional(&self.grade),
            group: optional(&self.group),
            photo: self.photo.staged().cloned(),
        }
    }

    /// Field-only update; the photo travels separately
    pub fn to_update(&self) -> PersonUpdate {
        PersonUpdate {
            full_name: optional(&self.full_name),
            email: optional(&self.email),
            grade: optional(&self.grade),
            group: optional(&self.group),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
