use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::config::AllocationConfig;
use crate::workflows::admission::admin::QuotaDraft;
use crate::workflows::admission::domain::{
    CourseId, CourseSettings, EnrollmentRequest, EventId, EventSettings, RegionQuota,
    RegionQuotaId, RegistrationRequest, UserId,
};
use crate::workflows::admission::memory::InMemoryCapacityStore;
use crate::workflows::admission::notify::{
    Notification, NotificationDispatcher, NotificationError,
};
use crate::workflows::admission::service::AdmissionService;
use crate::workflows::admission::store::{CapacityStore, CapacityTransaction, StoreError};
use crate::workflows::admission::admission_router;

pub(super) type MemoryService = AdmissionService<InMemoryCapacityStore, MemoryNotifier>;

#[derive(Default)]
pub(super) struct MemoryNotifier {
    pub(super) sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationDispatcher for FailingNotifier {
    fn dispatch(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

/// Fails the first `failures` transactions with a serialization error, then delegates.
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryCapacityStore,
    remaining_failures: AtomicU32,
    pub(super) attempts: AtomicU32,
}

impl FlakyStore {
    pub(super) fn new(failures: u32) -> Self {
        Self {
            inner: InMemoryCapacityStore::new(),
            remaining_failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }
}

impl CapacityStore for FlakyStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CapacityTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Serialization.into());
        }
        self.inner.transaction(work)
    }
}

/// Store that is never reachable.
pub(super) struct UnavailableStore;

impl CapacityStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CapacityTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        Err(StoreError::Unavailable("connection refused".to_string()).into())
    }
}

pub(super) fn allocation_config() -> AllocationConfig {
    AllocationConfig {
        default_municipality_limit: 2,
        max_transaction_attempts: 3,
    }
}

pub(super) fn build_service() -> (MemoryService, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::default());
    let service = AdmissionService::new(
        Arc::new(InMemoryCapacityStore::new()),
        notifier.clone(),
        allocation_config(),
    );
    (service, notifier)
}

pub(super) fn course_id() -> CourseId {
    CourseId("data-science-2025".to_string())
}

pub(super) fn event_id() -> EventId {
    EventId("forum-nordeste".to_string())
}

pub(super) fn open_course() -> CourseSettings {
    CourseSettings {
        course_id: course_id(),
        title: "Data Science Bootcamp".to_string(),
        max_enrollments: None,
        waitlist_enabled: false,
        waitlist_limit: None,
        region_restriction_enabled: false,
        allow_all_regions: false,
        enrollment_open: true,
    }
}

pub(super) fn restricted_course() -> CourseSettings {
    CourseSettings {
        region_restriction_enabled: true,
        ..open_course()
    }
}

pub(super) fn event() -> EventSettings {
    EventSettings {
        event_id: event_id(),
        title: "Forum Nordeste".to_string(),
        registration_open: true,
    }
}

pub(super) fn quota(id: u64, state: &str, city: Option<&str>) -> RegionQuota {
    RegionQuota {
        id: RegionQuotaId(id),
        course_id: course_id(),
        state: state.to_string(),
        city: city.map(str::to_string),
        limit: 10,
        current_count: 0,
        waitlist_limit: None,
        waitlist_count: 0,
    }
}

pub(super) fn quota_draft(state: &str, city: Option<&str>, limit: u32) -> QuotaDraft {
    QuotaDraft {
        state: state.to_string(),
        city: city.map(str::to_string),
        limit,
        waitlist_limit: None,
    }
}

pub(super) fn enrollment_request(user: &str, state: Option<&str>, city: Option<&str>) -> EnrollmentRequest {
    EnrollmentRequest {
        course_id: course_id(),
        user_id: UserId(user.to_string()),
        state: state.map(str::to_string),
        city: city.map(str::to_string),
    }
}

pub(super) fn registration_request(seed: u32, municipality: &str, state: &str) -> RegistrationRequest {
    RegistrationRequest {
        event_id: event_id(),
        cpf: cpf(seed),
        full_name: format!("Participante {seed}"),
        email: Some(format!("participante{seed}@example.org")),
        municipality: municipality.to_string(),
        state: state.to_string(),
    }
}

/// Builds a valid, digits-only cpf from a seed.
pub(super) fn cpf(seed: u32) -> String {
    let base = format!("{:09}", 100_000_000 + seed);
    let mut digits: Vec<u32> = base.chars().filter_map(|ch| ch.to_digit(10)).collect();
    for _ in 0..2 {
        let weight_start = digits.len() as u32 + 1;
        let sum: u32 = digits
            .iter()
            .enumerate()
            .map(|(index, digit)| digit * (weight_start - index as u32))
            .sum();
        digits.push((sum * 10) % 11 % 10);
    }
    digits.iter().map(|digit| digit.to_string()).collect()
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    admission_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
