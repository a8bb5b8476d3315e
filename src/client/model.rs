use super::response::timestamp;
use crate::encoder::{EncodedImage, ImagePayload};
use crate::error::EncodingError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A record of the remote people collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(alias = "_id")]
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_photo: bool,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Person {
    /// Relative photo path, if the record has a stored photo
    pub fn photo_path(&self) -> Option<&str> {
        self.photo_url
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }
}

/// Fields of a person to be created
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPerson {
    pub full_name: String,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub group: Option<String>,
    pub photo: Option<EncodedImage>,
}

impl NewPerson {
    pub fn new<S: Into<String>>(full_name: S) -> Self {
        Self {
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    /// Optional text fields that carry a value, as (name, trimmed value)
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("email", &self.email),
            ("grade", &self.grade),
            ("group", &self.group),
        ]
        .into_iter()
        .filter_map(|(name, value)| non_empty(value).map(|value| (name, value)))
        .collect()
    }
}

/// Partial field update. Blank fields are left untouched on the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub group: Option<String>,
}

impl PersonUpdate {
    /// JSON body holding only the non-empty fields
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (name, value) in [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("grade", &self.grade),
            ("group", &self.group),
        ] {
            if let Some(value) = non_empty(value) {
                body.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
        Value::Object(body)
    }

    pub fn is_empty(&self) -> bool {
        self.to_json().as_object().map_or(true, Map::is_empty)
    }
}

/// A photo to upload, either still encoded or already binary
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoSource {
    Encoded(EncodedImage),
    Binary(ImagePayload),
}

impl PhotoSource {
    pub fn into_payload(self) -> Result<ImagePayload, EncodingError> {
        match self {
            PhotoSource::Encoded(image) => image.decode(),
            PhotoSource::Binary(payload) => Ok(payload),
        }
    }
}

impl From<EncodedImage> for PhotoSource {
    fn from(image: EncodedImage) -> Self {
        PhotoSource::Encoded(image)
    }
}

impl From<ImagePayload> for PhotoSource {
    fn from(payload: ImagePayload) -> Self {
        PhotoSource::Binary(payload)
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Absolute URL of a person's photo, resolved against the API origin.
///
/// The `v` query parameter carries `updated_at` so a replaced photo is not
/// served from a stale cache.
pub fn photo_url_for(base_url: &str, person: &Person) -> Option<String> {
    let path = person.photo_path()?;

    let mut url = match Url::parse(base_url).and_then(|base| {
        let mut origin = base;
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        origin.join(path)
    }) {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot resolve photo path '{}' against '{}': {}", path, base_url, e);
            return Some(path.to_string());
        }
    };

    if let Some(updated_at) = person.updated_at {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| *key != "v")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("v", &timestamp::render(&updated_at));
    }

    Some(url.to_string())
}
