use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    CourseSettings, Enrollment, EnrollmentStatus, EventSettings, MunicipalityLimit, Registration,
};

/// Trait describing outbound notification hooks (in-app rows, e-mail adapters).
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    EnrollmentConfirmed,
    EnrollmentWaitlisted,
    EnrollmentPending,
    RegistrationConfirmed,
}

impl NotificationTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationTemplate::EnrollmentConfirmed => "enrollment_confirmed",
            NotificationTemplate::EnrollmentWaitlisted => "enrollment_waitlisted",
            NotificationTemplate::EnrollmentPending => "enrollment_pending",
            NotificationTemplate::RegistrationConfirmed => "registration_confirmed",
        }
    }
}

/// Payload handed to the dispatcher after an admission commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: NotificationTemplate,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    /// Returns `None` for statuses that never notify (rejections are admin actions).
    pub fn for_enrollment(enrollment: &Enrollment, course: &CourseSettings) -> Option<Self> {
        let mut details = BTreeMap::new();
        details.insert("course_id".to_string(), enrollment.course_id.0.clone());
        details.insert("status".to_string(), enrollment.status.label().to_string());

        let (template, message) = match enrollment.status {
            EnrollmentStatus::Confirmed => (
                NotificationTemplate::EnrollmentConfirmed,
                format!("Your enrollment in {} is confirmed.", course.title),
            ),
            EnrollmentStatus::Waitlist => {
                let position = enrollment.waitlist_position.unwrap_or_default();
                details.insert("waitlist_position".to_string(), position.to_string());
                (
                    NotificationTemplate::EnrollmentWaitlisted,
                    format!(
                        "You are number {position} on the waitlist for {}.",
                        course.title
                    ),
                )
            }
            EnrollmentStatus::PendingRegion => {
                let reason = enrollment
                    .eligibility_reason
                    .map(|reason| reason.summary())
                    .unwrap_or("awaiting review");
                details.insert("reason".to_string(), reason.to_string());
                (
                    NotificationTemplate::EnrollmentPending,
                    format!("Your enrollment in {} is pending: {reason}.", course.title),
                )
            }
            EnrollmentStatus::Rejected => return None,
        };

        Some(Self {
            recipient: enrollment.user_id.0.clone(),
            template,
            message,
            details,
        })
    }

    pub fn for_registration(
        registration: &Registration,
        event: &EventSettings,
        limit: &MunicipalityLimit,
    ) -> Self {
        let mut details = BTreeMap::new();
        details.insert("event_id".to_string(), registration.event_id.0.clone());
        details.insert(
            "batch_number".to_string(),
            registration.batch_number.to_string(),
        );
        details.insert(
            "municipality".to_string(),
            format!("{}/{}", limit.municipality, limit.state),
        );

        Self {
            recipient: registration.cpf.as_str().to_string(),
            template: NotificationTemplate::RegistrationConfirmed,
            message: format!(
                "Your registration for {} is confirmed in class {} for {}/{}.",
                event.title, registration.batch_number, limit.municipality, limit.state
            ),
            details,
        }
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
