use chrono::Utc;

use super::common::*;
use crate::workflows::admission::cohort::{admit, ensure_active_class};
use crate::workflows::admission::domain::{ClassStatus, EventId};
use crate::workflows::admission::memory::InMemoryCapacityStore;
use crate::workflows::admission::quota::resolve_or_create_municipality_limit;
use crate::workflows::admission::store::{CapacityStore, NewMunicipalityClass, StoreError};

fn store_with_event() -> InMemoryCapacityStore {
    let store = InMemoryCapacityStore::new();
    store
        .transaction(|tx| tx.upsert_event(event()))
        .expect("event stored");
    store
}

#[test]
fn first_admission_opens_class_one() {
    let store = store_with_event();
    let admission = store
        .transaction(|tx| {
            let limit = resolve_or_create_municipality_limit(tx, &event_id(), "Fortaleza", "CE", 3)?;
            admit(tx, &limit)
        })
        .expect("admitted");

    assert_eq!(admission.class.class_number, 1);
    assert_eq!(admission.class.current_count, 1);
    assert_eq!(admission.class.status, ClassStatus::Active);
    assert!(admission.opened.is_none());
}

#[test]
fn filling_a_class_closes_it_and_opens_the_next() {
    let store = store_with_event();
    let admissions = store
        .transaction(|tx| {
            let limit = resolve_or_create_municipality_limit(tx, &event_id(), "Fortaleza", "CE", 2)?;
            let first = admit(tx, &limit)?;
            let second = admit(tx, &limit)?;
            let third = admit(tx, &limit)?;
            Ok::<_, StoreError>((first, second, third, tx.classes(limit.id)?))
        })
        .expect("admitted");
    let (first, second, third, classes) = admissions;

    assert_eq!(first.class.class_number, 1);
    assert_eq!(second.class.class_number, 1);
    assert_eq!(second.class.status, ClassStatus::Closed);
    assert!(second.class.closed_at.is_some());
    assert_eq!(second.opened.as_ref().map(|class| class.class_number), Some(2));
    assert_eq!(third.class.class_number, 2);
    assert_eq!(third.class.current_count, 1);

    let active: Vec<_> = classes.iter().filter(|class| class.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(classes.len(), 2);
}

#[test]
fn ensure_active_class_opens_after_highest_closed_number() {
    let store = store_with_event();
    let class = store
        .transaction(|tx| {
            let limit = resolve_or_create_municipality_limit(tx, &event_id(), "Sobral", "CE", 5)?;
            let opened = tx.insert_class(NewMunicipalityClass {
                municipality_limit_id: limit.id,
                class_number: 4,
                limit: 5,
            })?;
            tx.close_class(opened.id, Utc::now())?;
            ensure_active_class(tx, &limit)
        })
        .expect("class opened");

    assert_eq!(class.class_number, 5);
    assert_eq!(class.status, ClassStatus::Active);
}

#[test]
fn ensure_active_class_rolls_over_a_full_active_class() {
    let store = store_with_event();
    let (class, classes) = store
        .transaction(|tx| {
            let limit = resolve_or_create_municipality_limit(tx, &event_id(), "Crato", "CE", 1)?;
            let opened = tx.insert_class(NewMunicipalityClass {
                municipality_limit_id: limit.id,
                class_number: 1,
                limit: 1,
            })?;
            tx.increment_class_count(opened.id)?;
            let class = ensure_active_class(tx, &limit)?;
            Ok::<_, StoreError>((class, tx.classes(limit.id)?))
        })
        .expect("rolled over");

    assert_eq!(class.class_number, 2);
    assert_eq!(classes[0].status, ClassStatus::Closed);
    assert!(classes[0].closed_at.is_some());
}

#[test]
fn municipality_limits_are_created_once_with_exact_keys() {
    let store = store_with_event();
    let (first, again, other_case) = store
        .transaction(|tx| {
            let first = resolve_or_create_municipality_limit(tx, &event_id(), "Fortaleza", "CE", 20)?;
            let again = resolve_or_create_municipality_limit(tx, &event_id(), "Fortaleza", "CE", 99)?;
            let other_case =
                resolve_or_create_municipality_limit(tx, &event_id(), "FORTALEZA", "CE", 20)?;
            Ok::<_, StoreError>((first, again, other_case))
        })
        .expect("limits resolved");

    assert_eq!(first.id, again.id);
    assert_eq!(again.default_limit, 20);
    assert_ne!(first.id, other_case.id);
}

#[test]
fn limits_require_an_existing_event() {
    let store = InMemoryCapacityStore::new();
    let err = store
        .transaction(|tx| {
            resolve_or_create_municipality_limit(tx, &EventId("ghost".into()), "Natal", "RN", 5)
        })
        .expect_err("event missing");
    assert!(matches!(err, StoreError::NotFound(_)));
}
