use super::api::PeopleApi;
use super::model::{NewPerson, Person, PersonUpdate, PhotoSource};
use super::response::{extract_error_message, normalize_list};
use crate::config::ApiConfig;
use crate::encoder::ImagePayload;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

/// People API client over HTTP
pub struct HttpPeopleClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpPeopleClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "base URL '{}' cannot hold a path",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/people/<segments...>`
    fn people_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("people").extend(segments);
        }
        url
    }

    /// Send a request, turning non-2xx answers into errors.
    ///
    /// `id` is the record the call targets; a 404 then means `NotFound`.
    async fn send(&self, request: RequestBuilder, id: Option<&str>) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                debug!(id = %id, "Person not found");
                return Err(ApiError::NotFound { id: id.to_string() });
            }
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| extract_error_message(&value))
            .unwrap_or_else(|| status_line(status));

        warn!(status = status.as_u16(), message = %message, "People API request failed");
        Err(ApiError::Remote {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_person(response: Response) -> Result<Person, ApiError> {
        response
            .json::<Person>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("Request failed with status code {} ({})", status.as_u16(), reason),
        None => format!("Request failed with status code {}", status.as_u16()),
    }
}

fn photo_part(payload: ImagePayload) -> Result<Part, ApiError> {
    let file_name = payload.file_name();
    Part::bytes(payload.bytes)
        .file_name(file_name)
        .mime_str(&payload.mime)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid photo mime type: {}", e)))
}

#[async_trait]
impl PeopleApi for HttpPeopleClient {
    async fn list(&self) -> Result<Vec<Person>, ApiError> {
        let url = self.people_url(&[""]);
        debug!(url = %url, "Listing people");

        let response = self.send(self.http_client.get(url), None).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        // A body that is not JSON is just another unrecognized shape
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "List response is not JSON; treating it as empty");
                Value::Null
            }
        };

        let people = normalize_list(body);
        info!(count = people.len(), "Fetched people");
        Ok(people)
    }

    async fn get(&self, id: &str) -> Result<Person, ApiError> {
        let url = self.people_url(&[id]);
        let response = self.send(self.http_client.get(url), Some(id)).await?;
        Self::read_person(response).await
    }

    async fn create(&self, person: &NewPerson) -> Result<Person, ApiError> {
        let full_name = person.full_name.trim();
        if full_name.is_empty() {
            return Err(ApiError::InvalidRequest("full_name is required".to_string()));
        }

        debug!(fields = ?create_field_names(person), "Creating person");
        let mut form = Form::new().text("full_name", full_name.to_string());
        for (name, value) in person.present_fields() {
            form = form.text(name, value.to_string());
        }
        if let Some(photo) = &person.photo {
            form = form.part("photo", photo_part(photo.decode()?)?);
        }

        let response = self
            .send(self.http_client.post(self.people_url(&[""])).multipart(form), None)
            .await?;
        let created = Self::read_person(response).await?;
        info!(id = %created.id, has_photo = created.has_photo, "Created person");
        Ok(created)
    }

    async fn update(&self, id: &str, update: &PersonUpdate) -> Result<Person, ApiError> {
        let body = update.to_json();
        debug!(id = %id, body = %body, "Updating person");

        let response = self
            .send(self.http_client.put(self.people_url(&[id])).json(&body), Some(id))
            .await?;
        Self::read_person(response).await
    }

    async fn update_photo(&self, id: &str, photo: PhotoSource) -> Result<Person, ApiError> {
        let payload = photo.into_payload()?;
        debug!(id = %id, mime = %payload.mime, bytes = payload.bytes.len(), "Uploading photo");

        let form = Form::new().part("photo", photo_part(payload)?);
        let response = self
            .send(
                self.http_client
                    .put(self.people_url(&[id, "photo"]))
                    .multipart(form),
                Some(id),
            )
            .await?;
        Self::read_person(response).await
    }

    async fn delete_photo(&self, id: &str) -> Result<Person, ApiError> {
        let response = self
            .send(self.http_client.delete(self.people_url(&[id, "photo"])), Some(id))
            .await?;
        Self::read_person(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.http_client.delete(self.people_url(&[id])), Some(id))
            .await?;
        info!(id = %id, "Deleted person");
        Ok(())
    }
}

/// Form fields a create call sends, in order
fn create_field_names(person: &NewPerson) -> Vec<&'static str> {
    let mut names = vec!["full_name"];
    names.extend(person.present_fields().into_iter().map(|(name, _)| name));
    if person.photo.is_some() {
        names.push("photo");
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::model::non_empty;

    fn client(base: &str) -> HttpPeopleClient {
        HttpPeopleClient::new(&ApiConfig {
            base_url: base.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_people_urls() {
        let client = client("http://localhost:8000");
        assert_eq!(
            client.people_url(&[""]).as_str(),
            "http://localhost:8000/people/"
        );
        assert_eq!(
            client.people_url(&["abc"]).as_str(),
            "http://localhost:8000/people/abc"
        );
        assert_eq!(
            client.people_url(&["abc", "photo"]).as_str(),
            "http://localhost:8000/people/abc/photo"
        );
    }

    #[test]
    fn test_people_urls_keep_base_path_and_escape_ids() {
        let client = client("https://school.example/api/");
        assert_eq!(
            client.people_url(&[""]).as_str(),
            "https://school.example/api/people/"
        );
        assert_eq!(
            client.people_url(&["a b/c"]).as_str(),
            "https://school.example/api/people/a%20b%2Fc"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpPeopleClient::new(&ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        });
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_create_field_names_skip_blank_values() {
        let person = NewPerson {
            full_name: "Ana".to_string(),
            email: Some("  ".to_string()),
            grade: Some("5".to_string()),
            group: None,
            photo: None,
        };
        assert_eq!(create_field_names(&person), vec!["full_name", "grade"]);
        assert!(non_empty(&person.email).is_none());
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            status_line(StatusCode::INTERNAL_SERVER_ERROR),
            "Request failed with status code 500 (Internal Server Error)"
        );
    }
}
