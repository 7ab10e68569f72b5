use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::domain::{
    ClassStatus, CourseId, CourseSettings, Cpf, Enrollment, EnrollmentId, EnrollmentStatus,
    EventId, EventSettings, MunicipalityClass, MunicipalityClassId, MunicipalityLimit,
    MunicipalityLimitId, RegionQuota, RegionQuotaId, Registration, RegistrationId,
    RegistrationStatus, UserId,
};
use super::store::{
    CapacityStore, CapacityTransaction, EnrollmentCounts, NewEnrollment, NewMunicipalityClass,
    NewMunicipalityLimit, NewRegionQuota, NewRegistration, StoreError,
};

/// Process-local store. Transactions are fully serialized behind one mutex. Read-only
/// transactions work directly on the committed tables. The first write copies every table,
/// so a writing transaction costs time proportional to the stored rows, and the copy replaces
/// the committed state only when the closure returns `Ok`.
#[derive(Debug, Default)]
pub struct InMemoryCapacityStore {
    tables: Mutex<Tables>,
}

impl InMemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: u64,
    courses: BTreeMap<CourseId, CourseSettings>,
    quotas: BTreeMap<RegionQuotaId, RegionQuota>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    events: BTreeMap<EventId, EventSettings>,
    limits: BTreeMap<MunicipalityLimitId, MunicipalityLimit>,
    classes: BTreeMap<MunicipalityClassId, MunicipalityClass>,
    registrations: BTreeMap<RegistrationId, Registration>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl CapacityStore for InMemoryCapacityStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CapacityTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        // Committed tables are only ever replaced wholesale, so a poisoned lock still guards
        // a consistent snapshot.
        let mut committed = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut transaction = MemoryTransaction {
            committed: &*committed,
            working: None,
            now: Utc::now(),
        };

        let value = work(&mut transaction)?;
        if let Some(tables) = transaction.working {
            *committed = tables;
        }
        Ok(value)
    }
}

/// Reads go to the committed tables until the first write, which copies them.
struct MemoryTransaction<'a> {
    committed: &'a Tables,
    working: Option<Tables>,
    now: DateTime<Utc>,
}

impl MemoryTransaction<'_> {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(self.committed)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let committed = self.committed;
        self.working.get_or_insert_with(|| committed.clone())
    }

    fn quota_mut(&mut self, id: RegionQuotaId) -> Result<&mut RegionQuota, StoreError> {
        self.tables_mut()
            .quotas
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("region quota {id}")))
    }

    fn class_mut(&mut self, id: MunicipalityClassId) -> Result<&mut MunicipalityClass, StoreError> {
        self.tables_mut()
            .classes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("municipality class {id}")))
    }
}

impl CapacityTransaction for MemoryTransaction<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn course(&self, id: &CourseId) -> Result<Option<CourseSettings>, StoreError> {
        Ok(self.tables().courses.get(id).cloned())
    }

    fn upsert_course(&mut self, settings: CourseSettings) -> Result<(), StoreError> {
        self.tables_mut()
            .courses
            .insert(settings.course_id.clone(), settings);
        Ok(())
    }

    fn delete_course(&mut self, id: &CourseId) -> Result<bool, StoreError> {
        let tables = self.tables_mut();
        let existed = tables.courses.remove(id).is_some();
        tables.quotas.retain(|_, quota| &quota.course_id != id);
        tables
            .enrollments
            .retain(|_, enrollment| &enrollment.course_id != id);
        Ok(existed)
    }

    fn region_quota(&self, id: RegionQuotaId) -> Result<Option<RegionQuota>, StoreError> {
        Ok(self.tables().quotas.get(&id).cloned())
    }

    fn region_quotas(&self, course: &CourseId) -> Result<Vec<RegionQuota>, StoreError> {
        Ok(self
            .tables()
            .quotas
            .values()
            .filter(|quota| &quota.course_id == course)
            .cloned()
            .collect())
    }

    fn insert_region_quota(&mut self, draft: NewRegionQuota) -> Result<RegionQuota, StoreError> {
        if !self.tables().courses.contains_key(&draft.course_id) {
            return Err(StoreError::NotFound(format!("course {}", draft.course_id)));
        }

        let quota = RegionQuota {
            id: RegionQuotaId(self.tables_mut().allocate_id()),
            course_id: draft.course_id,
            state: draft.state,
            city: draft.city,
            limit: draft.limit,
            current_count: 0,
            waitlist_limit: draft.waitlist_limit,
            waitlist_count: 0,
        };
        self.tables_mut().quotas.insert(quota.id, quota.clone());
        Ok(quota)
    }

    fn update_region_quota(&mut self, quota: &RegionQuota) -> Result<(), StoreError> {
        let stored = self.quota_mut(quota.id)?;
        *stored = quota.clone();
        Ok(())
    }

    fn increment_quota_confirmed(
        &mut self,
        id: RegionQuotaId,
    ) -> Result<RegionQuota, StoreError> {
        let quota = self.quota_mut(id)?;
        if quota.is_full() {
            return Err(StoreError::Invariant(format!(
                "region quota {id} is full ({}/{})",
                quota.current_count, quota.limit
            )));
        }
        quota.current_count += 1;
        Ok(quota.clone())
    }

    fn increment_quota_waitlist(&mut self, id: RegionQuotaId) -> Result<RegionQuota, StoreError> {
        let quota = self.quota_mut(id)?;
        if !quota.waitlist_has_room() {
            return Err(StoreError::Invariant(format!(
                "region quota {id} waitlist is full"
            )));
        }
        quota.waitlist_count += 1;
        Ok(quota.clone())
    }

    fn enrollment(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .find(|enrollment| &enrollment.user_id == user && &enrollment.course_id == course)
            .cloned())
    }

    fn enrollments(&self, course: &CourseId) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .filter(|enrollment| &enrollment.course_id == course)
            .cloned()
            .collect())
    }

    fn enrollment_counts(&self, course: &CourseId) -> Result<EnrollmentCounts, StoreError> {
        let mut counts = EnrollmentCounts::default();
        for enrollment in self.tables().enrollments.values() {
            if &enrollment.course_id != course {
                continue;
            }
            match enrollment.status {
                EnrollmentStatus::Confirmed => counts.confirmed += 1,
                EnrollmentStatus::Waitlist => counts.waitlisted += 1,
                EnrollmentStatus::PendingRegion | EnrollmentStatus::Rejected => {}
            }
        }
        Ok(counts)
    }

    fn insert_enrollment(&mut self, draft: NewEnrollment) -> Result<Enrollment, StoreError> {
        if !self.tables().courses.contains_key(&draft.course_id) {
            return Err(StoreError::NotFound(format!("course {}", draft.course_id)));
        }
        if self.enrollment(&draft.user_id, &draft.course_id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "enrollment ({}, {})",
                draft.user_id, draft.course_id
            )));
        }

        let enrollment = Enrollment {
            id: EnrollmentId(self.tables_mut().allocate_id()),
            user_id: draft.user_id,
            course_id: draft.course_id,
            status: draft.status,
            waitlist_position: draft.waitlist_position,
            region_quota_id: draft.region_quota_id,
            eligibility_reason: draft.eligibility_reason,
            region: draft.region,
            created_at: self.now,
        };
        self.tables_mut()
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let stored = self
            .tables_mut()
            .enrollments
            .get_mut(&enrollment.id)
            .ok_or_else(|| StoreError::NotFound(format!("enrollment {}", enrollment.id)))?;
        *stored = enrollment.clone();
        Ok(())
    }

    fn event(&self, id: &EventId) -> Result<Option<EventSettings>, StoreError> {
        Ok(self.tables().events.get(id).cloned())
    }

    fn upsert_event(&mut self, settings: EventSettings) -> Result<(), StoreError> {
        self.tables_mut()
            .events
            .insert(settings.event_id.clone(), settings);
        Ok(())
    }

    fn delete_event(&mut self, id: &EventId) -> Result<bool, StoreError> {
        let tables = self.tables_mut();
        let existed = tables.events.remove(id).is_some();
        let limit_ids: Vec<MunicipalityLimitId> = tables
            .limits
            .values()
            .filter(|limit| &limit.event_id == id)
            .map(|limit| limit.id)
            .collect();
        tables.limits.retain(|_, limit| &limit.event_id != id);
        tables
            .classes
            .retain(|_, class| !limit_ids.contains(&class.municipality_limit_id));
        tables
            .registrations
            .retain(|_, registration| &registration.event_id != id);
        Ok(existed)
    }

    fn municipality_limit(
        &self,
        event: &EventId,
        municipality: &str,
        state: &str,
    ) -> Result<Option<MunicipalityLimit>, StoreError> {
        Ok(self
            .tables()
            .limits
            .values()
            .find(|limit| {
                &limit.event_id == event
                    && limit.municipality == municipality
                    && limit.state == state
            })
            .cloned())
    }

    fn municipality_limits(&self, event: &EventId) -> Result<Vec<MunicipalityLimit>, StoreError> {
        Ok(self
            .tables()
            .limits
            .values()
            .filter(|limit| &limit.event_id == event)
            .cloned()
            .collect())
    }

    fn insert_municipality_limit(
        &mut self,
        draft: NewMunicipalityLimit,
    ) -> Result<MunicipalityLimit, StoreError> {
        if !self.tables().events.contains_key(&draft.event_id) {
            return Err(StoreError::NotFound(format!("event {}", draft.event_id)));
        }
        if self
            .municipality_limit(&draft.event_id, &draft.municipality, &draft.state)?
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "municipality limit ({}, {}/{})",
                draft.event_id, draft.municipality, draft.state
            )));
        }

        let limit = MunicipalityLimit {
            id: MunicipalityLimitId(self.tables_mut().allocate_id()),
            event_id: draft.event_id,
            municipality: draft.municipality,
            state: draft.state,
            default_limit: draft.default_limit,
        };
        self.tables_mut().limits.insert(limit.id, limit.clone());
        Ok(limit)
    }

    fn update_municipality_limit(&mut self, limit: &MunicipalityLimit) -> Result<(), StoreError> {
        let stored = self
            .tables_mut()
            .limits
            .get_mut(&limit.id)
            .ok_or_else(|| StoreError::NotFound(format!("municipality limit {}", limit.id)))?;
        *stored = limit.clone();
        Ok(())
    }

    fn classes(&self, limit: MunicipalityLimitId) -> Result<Vec<MunicipalityClass>, StoreError> {
        let mut classes: Vec<MunicipalityClass> = self
            .tables()
            .classes
            .values()
            .filter(|class| class.municipality_limit_id == limit)
            .cloned()
            .collect();
        classes.sort_by_key(|class| class.class_number);
        Ok(classes)
    }

    fn class(&self, id: MunicipalityClassId) -> Result<Option<MunicipalityClass>, StoreError> {
        Ok(self.tables().classes.get(&id).cloned())
    }

    fn insert_class(
        &mut self,
        draft: NewMunicipalityClass,
    ) -> Result<MunicipalityClass, StoreError> {
        if !self.tables().limits.contains_key(&draft.municipality_limit_id) {
            return Err(StoreError::NotFound(format!(
                "municipality limit {}",
                draft.municipality_limit_id
            )));
        }

        let siblings = self.classes(draft.municipality_limit_id)?;
        if siblings.iter().any(MunicipalityClass::is_active) {
            return Err(StoreError::Conflict(format!(
                "active class for municipality limit {}",
                draft.municipality_limit_id
            )));
        }
        if siblings
            .iter()
            .any(|class| class.class_number >= draft.class_number)
        {
            return Err(StoreError::Invariant(format!(
                "class number {} does not follow existing classes",
                draft.class_number
            )));
        }

        let class = MunicipalityClass {
            id: MunicipalityClassId(self.tables_mut().allocate_id()),
            municipality_limit_id: draft.municipality_limit_id,
            class_number: draft.class_number,
            limit: draft.limit,
            current_count: 0,
            status: ClassStatus::Active,
            created_at: self.now,
            closed_at: None,
        };
        self.tables_mut().classes.insert(class.id, class.clone());
        Ok(class)
    }

    fn close_class(
        &mut self,
        id: MunicipalityClassId,
        closed_at: DateTime<Utc>,
    ) -> Result<MunicipalityClass, StoreError> {
        let class = self.class_mut(id)?;
        if !class.is_active() {
            return Err(StoreError::Invariant(format!("class {id} is already closed")));
        }
        class.status = ClassStatus::Closed;
        class.closed_at = Some(closed_at);
        Ok(class.clone())
    }

    fn increment_class_count(
        &mut self,
        id: MunicipalityClassId,
    ) -> Result<MunicipalityClass, StoreError> {
        let class = self.class_mut(id)?;
        if !class.is_active() || class.is_full() {
            return Err(StoreError::Invariant(format!(
                "class {id} cannot take another registration ({}/{}, {:?})",
                class.current_count, class.limit, class.status
            )));
        }
        class.current_count += 1;
        Ok(class.clone())
    }

    fn release_class_seat(
        &mut self,
        id: MunicipalityClassId,
    ) -> Result<MunicipalityClass, StoreError> {
        let class = self.class_mut(id)?;
        if class.is_active() {
            class.current_count = class.current_count.saturating_sub(1);
        }
        Ok(class.clone())
    }

    fn registration_by_cpf(&self, cpf: &Cpf) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .tables()
            .registrations
            .values()
            .find(|registration| &registration.cpf == cpf)
            .cloned())
    }

    fn registrations(&self, event: &EventId) -> Result<Vec<Registration>, StoreError> {
        Ok(self
            .tables()
            .registrations
            .values()
            .filter(|registration| &registration.event_id == event)
            .cloned()
            .collect())
    }

    fn insert_registration(
        &mut self,
        draft: NewRegistration,
    ) -> Result<Registration, StoreError> {
        if self.registration_by_cpf(&draft.cpf)?.is_some() {
            return Err(StoreError::Conflict("registration cpf".to_string()));
        }

        let registration = Registration {
            id: RegistrationId(self.tables_mut().allocate_id()),
            event_id: draft.event_id,
            cpf: draft.cpf,
            full_name: draft.full_name,
            email: draft.email,
            municipality_limit_id: draft.municipality_limit_id,
            municipality_class_id: draft.municipality_class_id,
            batch_number: draft.batch_number,
            status: RegistrationStatus::Confirmed,
            created_at: self.now,
        };
        self.tables_mut()
            .registrations
            .insert(registration.id, registration.clone());
        Ok(registration)
    }

    fn update_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        let stored = self
            .tables_mut()
            .registrations
            .get_mut(&registration.id)
            .ok_or_else(|| StoreError::NotFound(format!("registration {}", registration.id)))?;
        *stored = registration.clone();
        Ok(())
    }
}
