use super::*;
use crate::client::{InMemoryPeopleApi, NewPerson, PeopleApi, Person};
use crate::error::ApiError;
use crate::invalidation::Invalidation;
use crate::notify::{drain, NotificationBus, NotificationLevel};
use chrono::Utc;
use std::sync::Arc;

fn person(id: &str, name: &str, grade: &str, group: &str) -> Person {
    Person {
        id: id.to_string(),
        full_name: name.to_string(),
        email: Some(format!("{}@school.example", id)),
        grade: Some(grade.to_string()),
        group: Some(group.to_string()),
        created_at: Utc::now(),
        updated_at: None,
        has_photo: false,
        photo_url: None,
    }
}

struct Harness {
    api: Arc<InMemoryPeopleApi>,
    view: CollectionView,
    bus: NotificationBus,
    invalidation: Invalidation,
}

fn create_test_harness() -> Harness {
    let api = Arc::new(InMemoryPeopleApi::new());
    api.insert(person("ana", "Ana Pérez", "5", "A"));
    api.insert(person("luis", "Luis Gómez", "6", "B"));
    api.insert(person("marta", "Marta Ruiz", "5", "B"));

    let bus = NotificationBus::new(32);
    let invalidation = Invalidation::new();
    let view = CollectionView::new(
        Arc::clone(&api) as Arc<dyn PeopleApi>,
        bus.clone(),
        invalidation.clone(),
    );
    Harness {
        api,
        view,
        bus,
        invalidation,
    }
}

#[tokio::test]
async fn test_fetch_populates_choices_and_rows() {
    let h = create_test_harness();
    assert!(!h.view.is_loaded());

    assert_eq!(h.view.fetch().await.unwrap(), 3);
    assert!(h.view.is_loaded());
    assert_eq!(h.view.grades(), vec!["5", "6"]);
    assert_eq!(h.view.groups(), vec!["A", "B"]);

    h.view.set_grade(Some("5".to_string()));
    h.view.set_group(Some("B".to_string()));
    let filtered = h.view.filtered();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "marta");

    h.view.set_filter(FilterState::default());
    assert_eq!(h.view.filtered().len(), 3);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_collection() {
    let h = create_test_harness();
    let mut rx = h.bus.subscribe();
    h.view.fetch().await.unwrap();

    h.api.fail_lists(true);
    let err = h.view.fetch().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(h.view.people().len(), 3);

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Error 503");
}

#[tokio::test]
async fn test_refresh_only_after_invalidation() {
    let h = create_test_harness();

    assert!(h.view.refresh_if_invalidated().await.unwrap());
    assert!(!h.view.refresh_if_invalidated().await.unwrap());
    assert_eq!(h.api.calls(), vec!["list"]);

    h.api
        .create(&NewPerson::new("Pablo Díaz"))
        .await
        .unwrap();
    h.invalidation.invalidate("person created");

    assert!(h.view.refresh_if_invalidated().await.unwrap());
    assert_eq!(h.view.people().len(), 4);
}

#[tokio::test]
async fn test_confirm_delete_refetches_and_closes_prompt() {
    let h = create_test_harness();
    let mut rx = h.bus.subscribe();
    h.view.fetch().await.unwrap();

    h.view.set_search("luis");
    assert_eq!(h.view.filtered().len(), 1);

    let luis = h.view.filtered().remove(0);
    h.view.request_delete(luis.clone());
    assert_eq!(h.view.pending_delete(), Some(luis.clone()));

    let deleted = h.view.confirm_delete().await.unwrap();
    assert_eq!(deleted, Some(luis));
    assert_eq!(h.view.pending_delete(), None);
    assert_eq!(h.view.people().len(), 2);
    assert!(h.view.filtered().is_empty());
    assert_eq!(h.invalidation.generation(), 1);
    assert_eq!(h.api.calls(), vec!["list", "delete", "list"]);

    let notes = drain(&mut rx);
    assert_eq!(notes[0].level, NotificationLevel::Success);
    assert_eq!(notes[0].title, "Person deleted");
}

#[tokio::test]
async fn test_failed_delete_changes_nothing() {
    let h = create_test_harness();
    let mut rx = h.bus.subscribe();
    h.view.fetch().await.unwrap();
    h.api.fail_deletes(true);

    let ana = h.view.people().remove(0);
    h.view.request_delete(ana.clone());

    let err = h.view.confirm_delete().await.unwrap_err();
    assert!(matches!(err, ApiError::Remote { status: 503, .. }));
    assert_eq!(h.view.pending_delete(), Some(ana));
    assert_eq!(h.view.people().len(), 3);
    assert_eq!(h.invalidation.generation(), 0);

    let notes = drain(&mut rx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Could not delete person");
    assert_eq!(notes[0].description, "Database unavailable");
}

#[tokio::test]
async fn test_delete_of_vanished_record_is_terminal() {
    let h = create_test_harness();
    h.view.fetch().await.unwrap();

    let ana = h.view.people().remove(0);
    h.api.delete(&ana.id).await.unwrap();

    h.view.request_delete(ana.clone());
    assert_eq!(h.view.confirm_delete().await.unwrap(), Some(ana));
    assert_eq!(h.view.pending_delete(), None);
    assert_eq!(h.view.people().len(), 2);
}

#[tokio::test]
async fn test_cancel_and_empty_confirm() {
    let h = create_test_harness();
    h.view.fetch().await.unwrap();

    assert_eq!(h.view.confirm_delete().await.unwrap(), None);

    h.view.request_delete(h.view.people().remove(0));
    h.view.cancel_delete();
    assert_eq!(h.view.confirm_delete().await.unwrap(), None);
    assert_eq!(h.api.len(), 3);
}
