use super::model::{NewPerson, Person, PersonUpdate, PhotoSource};
use crate::error::ApiError;
use async_trait::async_trait;

/// Operations on the remote people collection.
///
/// Implementations keep no local cache; every call is a round trip.
#[async_trait]
pub trait PeopleApi: Send + Sync {
    /// All people. Unrecognized response shapes yield an empty list.
    async fn list(&self) -> Result<Vec<Person>, ApiError>;

    async fn get(&self, id: &str) -> Result<Person, ApiError>;

    /// Create a person; the photo, if any, travels as its own multipart part
    async fn create(&self, person: &NewPerson) -> Result<Person, ApiError>;

    /// Update text fields only. Blank fields are not sent.
    async fn update(&self, id: &str, update: &PersonUpdate) -> Result<Person, ApiError>;

    async fn update_photo(&self, id: &str, photo: PhotoSource) -> Result<Person, ApiError>;

    /// Remove the stored photo; the returned person has no photo url
    async fn delete_photo(&self, id: &str) -> Result<Person, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}
