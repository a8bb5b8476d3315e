use super::draft::{DraftRecord, PhotoDraft};
use crate::client::{photo_url_for, PeopleApi, Person};
use crate::encoder::EncodedImage;
use crate::error::{ApiError, EditorError};
use crate::invalidation::Invalidation;
use crate::notify::{Notification, NotificationBus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the editor creates a new record or edits a bound one
#[derive(Debug, Clone, PartialEq)]
pub enum EditorMode {
    Create,
    Edit(Person),
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Person),
    Updated(Person),
}

impl SubmitOutcome {
    pub fn person(&self) -> &Person {
        match self {
            SubmitOutcome::Created(person) | SubmitOutcome::Updated(person) => person,
        }
    }
}

struct EditorInner {
    target: Option<Person>,
    draft: DraftRecord,
    /// Bumped whenever the target changes, so late results do not clobber a
    /// form the user has since switched away from
    binding: u64,
}

/// Holds the busy flag for the duration of one mutation
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Result<Self, EditorError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EditorError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Create/edit form for one person, coordinating submission with the API.
///
/// Only one mutation (create, update with photo, or photo deletion) runs at a
/// time; a second one fails with [`EditorError::Busy`] without touching the
/// network.
pub struct RecordEditor {
    api: Arc<dyn PeopleApi>,
    notifications: NotificationBus,
    invalidation: Invalidation,
    inner: Mutex<EditorInner>,
    busy: AtomicBool,
}

impl RecordEditor {
    pub fn new(
        api: Arc<dyn PeopleApi>,
        notifications: NotificationBus,
        invalidation: Invalidation,
    ) -> Self {
        Self {
            api,
            notifications,
            invalidation,
            inner: Mutex::new(EditorInner {
                target: None,
                draft: DraftRecord::default(),
                binding: 0,
            }),
            busy: AtomicBool::new(false),
        }
    }

    /// Switch to editing `person`, or to create mode with `None`
    pub fn bind(&self, person: Option<Person>) {
        let mut inner = self.inner.lock();
        inner.draft = person
            .as_ref()
            .map(DraftRecord::from_person)
            .unwrap_or_default();
        match &person {
            Some(person) => debug!(id = %person.id, "Editor bound to person"),
            None => debug!("Editor in create mode"),
        }
        inner.target = person;
        inner.binding += 1;
    }

    /// Clear the form without leaving the current mode
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.draft = DraftRecord::default();
    }

    pub fn mode(&self) -> EditorMode {
        match &self.inner.lock().target {
            Some(person) => EditorMode::Edit(person.clone()),
            None => EditorMode::Create,
        }
    }

    pub fn draft(&self) -> DraftRecord {
        self.inner.lock().draft.clone()
    }

    /// Change form fields in place
    pub fn edit<F: FnOnce(&mut DraftRecord)>(&self, change: F) {
        change(&mut self.inner.lock().draft);
    }

    pub fn stage_photo(&self, photo: EncodedImage) {
        self.inner.lock().draft.photo = PhotoDraft::Staged(photo);
    }

    /// Discard a staged photo; the stored one is not affected
    pub fn clear_photo(&self) {
        self.inner.lock().draft.photo = PhotoDraft::Cleared;
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The stored photo may be deleted: edit mode, a stored photo, and no
    /// replacement staged
    pub fn can_delete_photo(&self) -> bool {
        let inner = self.inner.lock();
        match &inner.target {
            Some(person) => person.has_photo && !inner.draft.photo.is_staged(),
            None => false,
        }
    }

    /// Cache-busted URL of the bound person's stored photo
    pub fn existing_photo_url(&self, base_url: &str) -> Option<String> {
        let inner = self.inner.lock();
        let person = inner.target.as_ref()?;
        if !person.has_photo {
            return None;
        }
        photo_url_for(base_url, person)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, EditorError> {
        let _busy = BusyGuard::claim(&self.busy)?;

        let (target, draft, binding) = {
            let inner = self.inner.lock();
            (inner.target.clone(), inner.draft.clone(), inner.binding)
        };

        if let Err(e) = draft.validate() {
            self.notifications.publish(Notification::warning(
                "Incomplete information",
                "Full name is required to continue.",
            ));
            return Err(e);
        }

        match target {
            None => self.submit_create(draft, binding).await,
            Some(person) => self.submit_edit(person, draft, binding).await,
        }
    }

    async fn submit_create(
        &self,
        draft: DraftRecord,
        binding: u64,
    ) -> Result<SubmitOutcome, EditorError> {
        let created = match self.api.create(&draft.to_new_person()).await {
            Ok(created) => created,
            Err(e) => return Err(self.report_failure(e)),
        };

        {
            let mut inner = self.inner.lock();
            if inner.binding == binding {
                inner.draft = DraftRecord::default();
            }
        }

        info!(id = %created.id, "Person created");
        self.notifications.publish(Notification::success(
            "Person created",
            format!("{} has been registered.", created.full_name),
        ));
        self.invalidation.invalidate("person created");
        Ok(SubmitOutcome::Created(created))
    }

    /// Fields first, then the photo. The two calls are not atomic.
    async fn submit_edit(
        &self,
        target: Person,
        draft: DraftRecord,
        binding: u64,
    ) -> Result<SubmitOutcome, EditorError> {
        let updated = match self.api.update(&target.id, &draft.to_update()).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.report_failure(e)),
        };

        let saved = match draft.photo.staged() {
            Some(photo) => match self.api.update_photo(&updated.id, photo.clone().into()).await {
                Ok(saved) => saved,
                Err(source) => {
                    warn!(id = %updated.id, error = %source, "Fields saved but photo upload failed");
                    self.rebind(binding, &updated, draft.photo.clone());
                    self.notifications.publish(Notification::error(
                        "Photo not saved",
                        format!(
                            "The details of {} were saved, but the photo could not be uploaded: {}",
                            updated.full_name, source
                        ),
                    ));
                    self.invalidation.invalidate("person fields updated");
                    return Err(EditorError::PartialFailure {
                        person: Box::new(updated),
                        source,
                    });
                }
            },
            None => updated,
        };

        self.rebind(binding, &saved, PhotoDraft::Untouched);
        info!(id = %saved.id, "Person updated");
        self.notifications.publish(Notification::success(
            "Person updated",
            format!("The details of {} have been updated.", saved.full_name),
        ));
        self.invalidation.invalidate("person updated");
        Ok(SubmitOutcome::Updated(saved))
    }

    /// Remove the bound person's stored photo
    pub async fn delete_photo(&self) -> Result<Person, EditorError> {
        let _busy = BusyGuard::claim(&self.busy)?;

        let (target, binding) = {
            let inner = self.inner.lock();
            match &inner.target {
                Some(person) if person.has_photo && !inner.draft.photo.is_staged() => {
                    (person.clone(), inner.binding)
                }
                _ => return Err(EditorError::PhotoNotDeletable),
            }
        };

        let person = match self.api.delete_photo(&target.id).await {
            Ok(person) => person,
            Err(e) => return Err(self.report_failure(e)),
        };

        {
            let mut inner = self.inner.lock();
            if inner.binding == binding {
                inner.target = Some(person.clone());
                inner.draft.photo = PhotoDraft::Cleared;
            }
        }

        info!(id = %person.id, "Person photo deleted");
        self.notifications.publish(Notification::success(
            "Photo deleted",
            "The photo has been removed from the record.",
        ));
        self.invalidation.invalidate("photo deleted");
        Ok(person)
    }

    /// Point the editor at the server's copy, keeping `photo` in the draft
    fn rebind(&self, binding: u64, person: &Person, photo: PhotoDraft) {
        let mut inner = self.inner.lock();
        if inner.binding != binding {
            debug!(id = %person.id, "Editor rebound during save; keeping the new form");
            return;
        }
        inner.draft = DraftRecord {
            photo,
            ..DraftRecord::from_person(person)
        };
        inner.target = Some(person.clone());
    }

    fn report_failure(&self, error: ApiError) -> EditorError {
        self.notifications
            .publish(Notification::from_api_error(&error));
        EditorError::Remote(error)
    }
}
