//! HttpPeopleClient against a fake people backend served by axum.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use rollcall::{
    ApiConfig, ApiError, EncodedImage, HttpPeopleClient, NewPerson, PeopleApi, PersonUpdate,
    PhotoSource,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Default)]
enum ListShape {
    #[default]
    Results,
    Data,
    Bare,
    Garbage,
    Html,
    Empty,
}

#[derive(Debug, Clone)]
struct FormField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Default)]
struct Backend {
    people: Vec<Value>,
    forms: Vec<Vec<FormField>>,
    json_bodies: Vec<Value>,
    list_shape: ListShape,
    next_id: u32,
    photo_version: u32,
}

type Shared = Arc<Mutex<Backend>>;

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Person not found" })),
    )
        .into_response()
}

async fn read_form(mut multipart: Multipart) -> Vec<FormField> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        fields.push(FormField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    fields
}

fn text_field(fields: &[FormField], name: &str) -> Option<String> {
    fields
        .iter()
        .find(|field| field.name == name && field.file_name.is_none())
        .map(|field| String::from_utf8_lossy(&field.data).into_owned())
}

async fn list_people(State(state): State<Shared>) -> Response {
    let backend = state.lock().unwrap();
    let people = Value::Array(backend.people.clone());
    let body = match backend.list_shape {
        ListShape::Results => json!({ "results": people }),
        ListShape::Data => json!({ "data": people }),
        ListShape::Bare => people,
        ListShape::Garbage => json!("not an array or object"),
        ListShape::Html => {
            return (
                [(axum::http::header::CONTENT_TYPE, "text/html")],
                "<html>maintenance</html>",
            )
                .into_response()
        }
        ListShape::Empty => return StatusCode::OK.into_response(),
    };
    Json(body).into_response()
}

async fn create_person(State(state): State<Shared>, multipart: Multipart) -> Response {
    let fields = read_form(multipart).await;
    let full_name = text_field(&fields, "full_name").unwrap_or_default();

    if full_name == "Reject Me" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "detail": [{ "loc": ["body", "full_name"], "msg": "Name is on the blocklist" }]
            })),
        )
            .into_response();
    }

    let mut backend = state.lock().unwrap();
    backend.next_id += 1;
    let id = format!("p{}", backend.next_id);
    let has_photo = fields.iter().any(|field| field.name == "photo");
    let photo_url = if has_photo {
        Value::String(format!("/static/photos/{}.jpg", id))
    } else {
        Value::Null
    };
    let person = json!({
        "id": id,
        "full_name": full_name,
        "email": text_field(&fields, "email"),
        "grade": text_field(&fields, "grade"),
        "group": text_field(&fields, "group"),
        "created_at": "2024-05-01T10:00:00.123456",
        "updated_at": null,
        "has_photo": has_photo,
        "photo_url": photo_url
    });
    backend.people.push(person.clone());
    backend.forms.push(fields);
    (StatusCode::CREATED, Json(person)).into_response()
}

async fn get_person(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    if id == "boom" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": { "message": "Database exploded" },
                "message": "Internal error"
            })),
        )
            .into_response();
    }
    if id == "teapot" {
        return StatusCode::IM_A_TEAPOT.into_response();
    }

    let backend = state.lock().unwrap();
    match backend.people.iter().find(|person| person["id"] == id) {
        Some(person) => Json(person.clone()).into_response(),
        None => not_found(),
    }
}

async fn update_person(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = state.lock().unwrap();
    backend.json_bodies.push(body.clone());
    let Some(person) = backend.people.iter_mut().find(|person| person["id"] == id) else {
        return not_found();
    };
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            person[key] = value.clone();
        }
    }
    person["updated_at"] = json!("2024-05-02T11:00:00");
    Json(person.clone()).into_response()
}

async fn delete_person(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut backend = state.lock().unwrap();
    let before = backend.people.len();
    backend.people.retain(|person| person["id"] != id);
    if backend.people.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn update_photo(
    State(state): State<Shared>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let fields = read_form(multipart).await;
    let mut backend = state.lock().unwrap();
    backend.photo_version += 1;
    let version = backend.photo_version;
    backend.forms.push(fields);

    let Some(person) = backend.people.iter_mut().find(|person| person["id"] == id) else {
        return not_found();
    };
    person["has_photo"] = json!(true);
    person["photo_url"] = json!(format!("/static/photos/{}_{}.jpg", id, version));
    person["updated_at"] = json!("2024-05-02T12:00:00+00:00");
    Json(person.clone()).into_response()
}

async fn delete_photo(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut backend = state.lock().unwrap();
    let Some(person) = backend.people.iter_mut().find(|person| person["id"] == id) else {
        return not_found();
    };
    person["has_photo"] = json!(false);
    person["photo_url"] = Value::Null;
    Json(person.clone()).into_response()
}

async fn spawn_backend() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(Backend::default()));
    let app = Router::new()
        .route("/people/", get(list_people).post(create_person))
        .route(
            "/people/:id",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/people/:id/photo", put(update_photo).delete(delete_photo))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", address), state)
}

fn client_for(base_url: &str) -> HttpPeopleClient {
    HttpPeopleClient::new(&ApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        ..ApiConfig::default()
    })
    .unwrap()
}

fn jpeg_photo() -> EncodedImage {
    EncodedImage::from_bytes("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9])
}

#[tokio::test]
async fn test_create_sends_multipart_with_photo_part() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);

    let created = client
        .create(&NewPerson {
            full_name: "Ana Pérez".to_string(),
            email: Some("ana@school.example".to_string()),
            grade: Some("5".to_string()),
            group: Some("   ".to_string()),
            photo: Some(jpeg_photo()),
        })
        .await
        .unwrap();

    assert_eq!(created.id, "p1");
    assert_eq!(created.full_name, "Ana Pérez");
    assert!(created.has_photo);
    assert_eq!(created.photo_url.as_deref(), Some("/static/photos/p1.jpg"));

    let backend = state.lock().unwrap();
    let form = &backend.forms[0];
    let names: Vec<&str> = form.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, vec!["full_name", "email", "grade", "photo"]);

    let photo = form.iter().find(|field| field.name == "photo").unwrap();
    assert_eq!(photo.file_name.as_deref(), Some("photo.jpg"));
    assert_eq!(photo.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(photo.data, vec![0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9]);
}

#[tokio::test]
async fn test_create_without_photo_and_blank_name() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);

    let created = client.create(&NewPerson::new("Luis")).await.unwrap();
    assert!(!created.has_photo);
    assert_eq!(created.email, None);

    let err = client.create(&NewPerson::new("  ")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(state.lock().unwrap().forms.len(), 1);
}

#[tokio::test]
async fn test_list_accepts_every_shape() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);
    client.create(&NewPerson::new("Ana")).await.unwrap();
    client.create(&NewPerson::new("Luis")).await.unwrap();

    for shape in [ListShape::Results, ListShape::Data, ListShape::Bare] {
        state.lock().unwrap().list_shape = shape;
        let people = client.list().await.unwrap();
        let names: Vec<String> = people.into_iter().map(|p| p.full_name).collect();
        assert_eq!(names, vec!["Ana", "Luis"]);
    }

    for shape in [ListShape::Garbage, ListShape::Html, ListShape::Empty] {
        state.lock().unwrap().list_shape = shape;
        assert!(client.list().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_error_mapping() {
    let (base_url, _state) = spawn_backend().await;
    let client = client_for(&base_url);

    assert_eq!(
        client.get("nobody").await.unwrap_err(),
        ApiError::NotFound {
            id: "nobody".to_string()
        }
    );
    assert_eq!(
        client.get("boom").await.unwrap_err(),
        ApiError::Remote {
            status: 500,
            message: "Database exploded".to_string()
        }
    );

    let validation = client
        .create(&NewPerson::new("Reject Me"))
        .await
        .unwrap_err();
    assert_eq!(
        validation,
        ApiError::Remote {
            status: 422,
            message: "Name is on the blocklist".to_string()
        }
    );

    // No body: fall back to the status line
    match client.get("teapot").await.unwrap_err() {
        ApiError::Remote { status, message } => {
            assert_eq!(status, 418);
            assert!(message.contains("418"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_update_sends_only_filled_fields_as_json() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);
    let created = client.create(&NewPerson::new("Ana")).await.unwrap();

    let updated = client
        .update(
            &created.id,
            &PersonUpdate {
                full_name: Some("Ana María".to_string()),
                email: Some(String::new()),
                grade: None,
                group: Some("B".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.full_name, "Ana María");
    assert_eq!(updated.group.as_deref(), Some("B"));
    assert!(updated.updated_at.is_some());
    assert_eq!(
        state.lock().unwrap().json_bodies,
        vec![json!({ "full_name": "Ana María", "group": "B" })]
    );

    assert!(client
        .update("nobody", &PersonUpdate::default())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_photo_lifecycle() {
    let (base_url, state) = spawn_backend().await;
    let client = client_for(&base_url);
    let created = client.create(&NewPerson::new("Ana")).await.unwrap();

    let with_photo = client
        .update_photo(&created.id, PhotoSource::from(jpeg_photo()))
        .await
        .unwrap();
    assert!(with_photo.has_photo);
    assert_eq!(with_photo.photo_url.as_deref(), Some("/static/photos/p1_1.jpg"));
    {
        let backend = state.lock().unwrap();
        let upload = &backend.forms[1];
        assert_eq!(upload.len(), 1);
        assert_eq!(upload[0].name, "photo");
        assert_eq!(upload[0].content_type.as_deref(), Some("image/jpeg"));
    }

    let cleared = client.delete_photo(&created.id).await.unwrap();
    assert!(!cleared.has_photo);
    assert_eq!(cleared.photo_url, None);

    assert!(client.delete_photo("nobody").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let (base_url, _state) = spawn_backend().await;
    let client = client_for(&base_url);
    let created = client.create(&NewPerson::new("Ana")).await.unwrap();

    client.delete(&created.id).await.unwrap();
    assert!(client.list().await.unwrap().is_empty());
    assert!(client.delete(&created.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", address));
    assert!(matches!(
        client.list().await,
        Err(ApiError::Transport(_))
    ));
}
