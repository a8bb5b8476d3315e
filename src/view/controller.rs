use super::filter::{distinct_grades, distinct_groups, FilterState};
use crate::client::{PeopleApi, Person};
use crate::error::ApiError;
use crate::invalidation::Invalidation;
use crate::notify::{Notification, NotificationBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct ViewState {
    people: Vec<Person>,
    /// Invalidation generation the current collection was fetched at
    fetched_at: Option<u64>,
    filter: FilterState,
    pending_delete: Option<Person>,
}

/// The fetched people collection plus filter and delete-prompt state.
///
/// Derived values (choices, filtered rows) are computed on demand from the
/// current collection. After any mutation the collection is refetched rather
/// than patched locally.
pub struct CollectionView {
    api: Arc<dyn PeopleApi>,
    notifications: NotificationBus,
    invalidation: Invalidation,
    state: Mutex<ViewState>,
}

impl CollectionView {
    pub fn new(
        api: Arc<dyn PeopleApi>,
        notifications: NotificationBus,
        invalidation: Invalidation,
    ) -> Self {
        Self {
            api,
            notifications,
            invalidation,
            state: Mutex::new(ViewState::default()),
        }
    }

    /// Fetch the collection. On failure the previous one is kept.
    pub async fn fetch(&self) -> Result<usize, ApiError> {
        let generation = self.invalidation.generation();

        match self.api.list().await {
            Ok(people) => {
                let count = people.len();
                let mut state = self.state.lock();
                state.people = people;
                state.fetched_at = Some(generation);
                debug!(count, generation, "Collection fetched");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch people");
                self.notifications.publish(Notification::from_api_error(&e));
                Err(e)
            }
        }
    }

    /// Refetch if anything was invalidated since the last fetch
    pub async fn refresh_if_invalidated(&self) -> Result<bool, ApiError> {
        let current = self.invalidation.generation();
        if self.state.lock().fetched_at == Some(current) {
            return Ok(false);
        }
        self.fetch().await?;
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().fetched_at.is_some()
    }

    pub fn people(&self) -> Vec<Person> {
        self.state.lock().people.clone()
    }

    pub fn grades(&self) -> Vec<String> {
        distinct_grades(&self.state.lock().people)
    }

    pub fn groups(&self) -> Vec<String> {
        distinct_groups(&self.state.lock().people)
    }

    pub fn filter(&self) -> FilterState {
        self.state.lock().filter.clone()
    }

    pub fn set_filter(&self, filter: FilterState) {
        self.state.lock().filter = filter;
    }

    pub fn set_grade(&self, grade: Option<String>) {
        self.state.lock().filter.grade = grade;
    }

    pub fn set_group(&self, group: Option<String>) {
        self.state.lock().filter.group = group;
    }

    pub fn set_search<S: Into<String>>(&self, search: S) {
        self.state.lock().filter.search = search.into();
    }

    /// People passing the current filter, in collection order
    pub fn filtered(&self) -> Vec<Person> {
        let state = self.state.lock();
        state
            .filter
            .apply(&state.people)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Open the delete confirmation for `person`
    pub fn request_delete(&self, person: Person) {
        debug!(id = %person.id, "Delete requested");
        self.state.lock().pending_delete = Some(person);
    }

    pub fn cancel_delete(&self) {
        self.state.lock().pending_delete = None;
    }

    pub fn pending_delete(&self) -> Option<Person> {
        self.state.lock().pending_delete.clone()
    }

    /// Delete the person awaiting confirmation.
    ///
    /// Returns `Ok(None)` when no confirmation is open. On failure nothing
    /// changes: the prompt stays open and the collection is untouched.
    pub async fn confirm_delete(&self) -> Result<Option<Person>, ApiError> {
        let person = match self.pending_delete() {
            Some(person) => person,
            None => return Ok(None),
        };

        match self.api.delete(&person.id).await {
            Ok(()) => {}
            Err(ApiError::NotFound { .. }) => {
                info!(id = %person.id, "Person was already deleted");
            }
            Err(e) => {
                let description = match &e {
                    ApiError::Remote { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.notifications
                    .publish(Notification::error("Could not delete person", description));
                return Err(e);
            }
        }

        {
            let mut state = self.state.lock();
            if state.pending_delete.as_ref().map(|p| &p.id) == Some(&person.id) {
                state.pending_delete = None;
            }
        }

        self.notifications.publish(Notification::success(
            "Person deleted",
            format!("{} has been removed.", person.full_name),
        ));
        self.invalidation.invalidate("person deleted");

        // A failed refetch was already reported; the delete itself succeeded
        let _ = self.refresh_if_invalidated().await;
        Ok(Some(person))
    }
}
