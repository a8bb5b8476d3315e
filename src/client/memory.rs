use super::api::PeopleApi;
use super::model::{non_empty, NewPerson, Person, PersonUpdate, PhotoSource};
use crate::encoder::ImagePayload;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// In-process people collection with the same contract as the REST backend.
///
/// The server side is simulated faithfully enough for flows to be exercised
/// without a network: ids and timestamps are assigned here, photo urls change
/// on every photo write, and failures can be injected per operation.
pub struct InMemoryPeopleApi {
    store: Mutex<Store>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<&'static str>>,
}

#[derive(Default)]
struct Store {
    people: Vec<Person>,
    photos: HashMap<String, ImagePayload>,
    photo_version: u64,
}

#[derive(Default, Clone)]
struct Faults {
    latency: Duration,
    fail_lists: bool,
    fail_photo_updates: bool,
    fail_deletes: bool,
}

impl Store {
    fn find_mut(&mut self, id: &str) -> Result<&mut Person, ApiError> {
        self.people
            .iter_mut()
            .find(|person| person.id == id)
            .ok_or_else(|| ApiError::NotFound { id: id.to_string() })
    }
}

fn unprocessable(message: &str) -> ApiError {
    ApiError::Remote {
        status: 422,
        message: message.to_string(),
    }
}

fn unavailable(message: &str) -> ApiError {
    ApiError::Remote {
        status: 503,
        message: message.to_string(),
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

impl InMemoryPeopleApi {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Seed a record as if the server already had it
    pub fn insert(&self, person: Person) {
        self.store.lock().people.push(person);
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.faults.lock().latency = latency;
        self
    }

    pub fn fail_lists(&self, fail: bool) {
        self.faults.lock().fail_lists = fail;
    }

    pub fn fail_photo_updates(&self, fail: bool) {
        self.faults.lock().fail_photo_updates = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.faults.lock().fail_deletes = fail;
    }

    /// Operations received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Stored photo bytes for a person
    pub fn photo(&self, id: &str) -> Option<ImagePayload> {
        self.store.lock().photos.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.lock().people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the call and wait out any configured latency
    async fn enter(&self, operation: &'static str) -> Faults {
        self.calls.lock().push(operation);
        let faults = self.faults.lock().clone();
        if !faults.latency.is_zero() {
            tokio::time::sleep(faults.latency).await;
        }
        debug!(operation, "In-memory people API call");
        faults
    }

    fn store_photo(store: &mut Store, id: &str, payload: ImagePayload) -> Result<Person, ApiError> {
        if payload.bytes.is_empty() {
            return Err(unprocessable("photo: uploaded file is empty"));
        }
        if !payload.mime.starts_with("image/") {
            return Err(unprocessable("photo: file must be an image"));
        }

        store.photo_version += 1;
        let version = store.photo_version;
        let photo_url = format!(
            "/static/photos/{}_{}.{}",
            id,
            version,
            extension_for(&payload.mime)
        );

        let person = store.find_mut(id)?;
        person.has_photo = true;
        person.photo_url = Some(photo_url);
        person.updated_at = Some(Utc::now());
        let updated = person.clone();

        store.photos.insert(id.to_string(), payload);
        Ok(updated)
    }
}

impl Default for InMemoryPeopleApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeopleApi for InMemoryPeopleApi {
    async fn list(&self) -> Result<Vec<Person>, ApiError> {
        let faults = self.enter("list").await;
        if faults.fail_lists {
            return Err(unavailable("Database unavailable"));
        }
        Ok(self.store.lock().people.clone())
    }

    async fn get(&self, id: &str) -> Result<Person, ApiError> {
        self.enter("get").await;
        let mut store = self.store.lock();
        store.find_mut(id).map(|person| person.clone())
    }

    async fn create(&self, new: &NewPerson) -> Result<Person, ApiError> {
        self.enter("create").await;

        let full_name = new.full_name.trim();
        if full_name.is_empty() {
            return Err(unprocessable(
                "full_name: String should have at least 1 character",
            ));
        }
        let photo = new.photo.as_ref().map(|image| image.decode()).transpose()?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let person = Person {
            id: id.clone(),
            full_name: full_name.to_string(),
            email: non_empty(&new.email).map(str::to_string),
            grade: non_empty(&new.grade).map(str::to_string),
            group: non_empty(&new.group).map(str::to_string),
            created_at: Utc::now(),
            updated_at: None,
            has_photo: false,
            photo_url: None,
        };

        let mut store = self.store.lock();
        store.people.push(person.clone());
        let created = match photo {
            Some(payload) => match Self::store_photo(&mut store, &id, payload) {
                Ok(created) => created,
                Err(e) => {
                    store.people.retain(|person| person.id != id);
                    return Err(e);
                }
            },
            None => person,
        };

        info!(id = %created.id, "Created person in memory");
        Ok(created)
    }

    async fn update(&self, id: &str, update: &PersonUpdate) -> Result<Person, ApiError> {
        self.enter("update").await;

        let mut store = self.store.lock();
        let person = store.find_mut(id)?;
        if let Some(full_name) = non_empty(&update.full_name) {
            person.full_name = full_name.to_string();
        }
        if let Some(email) = non_empty(&update.email) {
            person.email = Some(email.to_string());
        }
        if let Some(grade) = non_empty(&update.grade) {
            person.grade = Some(grade.to_string());
        }
        if let Some(group) = non_empty(&update.group) {
            person.group = Some(group.to_string());
        }
        person.updated_at = Some(Utc::now());
        Ok(person.clone())
    }

    async fn update_photo(&self, id: &str, photo: PhotoSource) -> Result<Person, ApiError> {
        let faults = self.enter("update_photo").await;
        let payload = photo.into_payload()?;

        let mut store = self.store.lock();
        store.find_mut(id)?;
        if faults.fail_photo_updates {
            return Err(unavailable("Photo storage unavailable"));
        }
        Self::store_photo(&mut store, id, payload)
    }

    async fn delete_photo(&self, id: &str) -> Result<Person, ApiError> {
        self.enter("delete_photo").await;

        let mut store = self.store.lock();
        store.photos.remove(id);
        let person = store.find_mut(id)?;
        person.has_photo = false;
        person.photo_url = None;
        person.updated_at = Some(Utc::now());
        Ok(person.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let faults = self.enter("delete").await;

        let mut store = self.store.lock();
        store.find_mut(id)?;
        if faults.fail_deletes {
            return Err(unavailable("Database unavailable"));
        }
        store.people.retain(|person| person.id != id);
        store.photos.remove(id);
        info!(id = %id, "Deleted person in memory");
        Ok(())
    }
}
