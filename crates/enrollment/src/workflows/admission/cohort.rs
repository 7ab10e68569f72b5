//! Class/cohort manager for event registrations.
//!
//! Each municipality limit owns a chain of numbered classes. Exactly one class is ACTIVE
//! once the first registration arrives; the moment its count reaches its limit it is
//! closed and the next number is opened in the same transaction.

use serde::Serialize;
use tracing::debug;

use super::domain::{MunicipalityClass, MunicipalityLimit};
use super::store::{CapacityTransaction, NewMunicipalityClass, StoreError};

/// Class a registrant was admitted into, plus the class opened because it filled up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassAdmission {
    pub class: MunicipalityClass,
    pub opened: Option<MunicipalityClass>,
}

/// Returns the ACTIVE class with room, opening or rolling over as needed.
pub fn ensure_active_class(
    tx: &mut dyn CapacityTransaction,
    limit: &MunicipalityLimit,
) -> Result<MunicipalityClass, StoreError> {
    let classes = tx.classes(limit.id)?;

    match classes.iter().find(|class| class.is_active()) {
        Some(active) if !active.is_full() => Ok(active.clone()),
        Some(active) => {
            let now = tx.now();
            let closed = tx.close_class(active.id, now)?;
            open_class(tx, limit, closed.class_number + 1)
        }
        None => {
            let next = classes
                .iter()
                .map(|class| class.class_number)
                .max()
                .unwrap_or(0)
                + 1;
            open_class(tx, limit, next)
        }
    }
}

/// Takes one seat in the active class. Fills trigger closure and the next class.
pub fn admit(
    tx: &mut dyn CapacityTransaction,
    limit: &MunicipalityLimit,
) -> Result<ClassAdmission, StoreError> {
    let active = ensure_active_class(tx, limit)?;
    let class = tx.increment_class_count(active.id)?;

    if !class.is_full() {
        return Ok(ClassAdmission {
            class,
            opened: None,
        });
    }

    let now = tx.now();
    let closed = tx.close_class(class.id, now)?;
    let opened = open_class(tx, limit, closed.class_number + 1)?;
    Ok(ClassAdmission {
        class: closed,
        opened: Some(opened),
    })
}

fn open_class(
    tx: &mut dyn CapacityTransaction,
    limit: &MunicipalityLimit,
    class_number: u32,
) -> Result<MunicipalityClass, StoreError> {
    let class = tx.insert_class(NewMunicipalityClass {
        municipality_limit_id: limit.id,
        class_number,
        limit: limit.default_limit,
    })?;
    debug!(
        municipality = %limit.municipality,
        state = %limit.state,
        class_number,
        limit = limit.default_limit,
        "opened municipality class"
    );
    Ok(class)
}
