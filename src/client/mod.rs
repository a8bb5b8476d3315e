//! Typed access to the remote people collection.

mod api;
mod http;
mod memory;
mod model;
pub mod response;


pub use api::PeopleApi;
pub use http::HttpPeopleClient;
pub use memory::InMemoryPeopleApi;
pub use model::{photo_url_for, NewPerson, Person, PersonUpdate, PhotoSource};
pub use response::{extract_error_message, normalize_list};
