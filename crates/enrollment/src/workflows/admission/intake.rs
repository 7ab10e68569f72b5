use super::domain::{
    CourseId, Cpf, EnrollmentRequest, EventId, Region, RegistrationRequest, UserId,
};

/// Validation errors raised before any store transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("user identity is required")]
    MissingIdentity,
    #[error("course identifier is required")]
    MissingCourse,
    #[error("event identifier is required")]
    MissingEvent,
    #[error("state must be a two-letter code, found '{0}'")]
    InvalidState(String),
    #[error("city was provided without a state")]
    CityWithoutState,
    #[error("cpf must contain 11 digits with valid check digits")]
    InvalidCpf,
    #[error("full name is required")]
    MissingName,
    #[error("municipality is required")]
    MissingMunicipality,
    #[error("email address '{0}' is malformed")]
    InvalidEmail(String),
}

/// Enrollment request after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedEnrollment {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub region: Option<Region>,
}

/// Registration request after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedRegistration {
    pub event_id: EventId,
    pub cpf: Cpf,
    pub full_name: String,
    pub email: Option<String>,
    pub municipality: String,
    pub state: String,
}

impl Cpf {
    /// Accepts formatted (`529.982.247-25`) or bare input and verifies both check digits.
    pub fn parse(raw: &str) -> Result<Self, IntakeViolation> {
        let digits: Vec<u32> = raw
            .chars()
            .filter(|ch| !matches!(ch, '.' | '-' | ' '))
            .map(|ch| ch.to_digit(10).ok_or(IntakeViolation::InvalidCpf))
            .collect::<Result<_, _>>()?;

        if digits.len() != 11 || digits.iter().all(|digit| *digit == digits[0]) {
            return Err(IntakeViolation::InvalidCpf);
        }

        if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
            return Err(IntakeViolation::InvalidCpf);
        }

        Ok(Cpf(digits
            .iter()
            .filter_map(|digit| char::from_digit(*digit, 10))
            .collect()))
    }
}

fn check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(index, digit)| digit * (weight_start - index as u32))
        .sum();
    (sum * 10) % 11 % 10
}

/// Uppercases and checks a two-letter UF code.
pub(crate) fn normalize_state(raw: &str) -> Result<String, IntakeViolation> {
    let state = raw.trim().to_ascii_uppercase();
    if state.len() == 2 && state.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(state)
    } else {
        Err(IntakeViolation::InvalidState(raw.trim().to_string()))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Builds the optional declared region. A blank city means state-wide.
pub(crate) fn normalize_region(
    state: Option<&str>,
    city: Option<&str>,
) -> Result<Option<Region>, IntakeViolation> {
    let city = non_blank(city);
    match non_blank(state) {
        Some(state) => Ok(Some(Region {
            state: normalize_state(&state)?,
            city,
        })),
        None if city.is_some() => Err(IntakeViolation::CityWithoutState),
        None => Ok(None),
    }
}

pub(crate) fn enrollment_from_request(
    request: EnrollmentRequest,
) -> Result<ValidatedEnrollment, IntakeViolation> {
    let user_id =
        non_blank(Some(request.user_id.0.as_str())).ok_or(IntakeViolation::MissingIdentity)?;
    let course_id =
        non_blank(Some(request.course_id.0.as_str())).ok_or(IntakeViolation::MissingCourse)?;
    let region = normalize_region(request.state.as_deref(), request.city.as_deref())?;

    Ok(ValidatedEnrollment {
        course_id: CourseId(course_id),
        user_id: UserId(user_id),
        region,
    })
}

pub(crate) fn registration_from_request(
    request: RegistrationRequest,
) -> Result<ValidatedRegistration, IntakeViolation> {
    let event_id =
        non_blank(Some(request.event_id.0.as_str())).ok_or(IntakeViolation::MissingEvent)?;
    let cpf = Cpf::parse(&request.cpf)?;
    let full_name =
        non_blank(Some(request.full_name.as_str())).ok_or(IntakeViolation::MissingName)?;
    let municipality = non_blank(Some(request.municipality.as_str()))
        .ok_or(IntakeViolation::MissingMunicipality)?;
    let state = normalize_state(&request.state)?;

    let email = non_blank(request.email.as_deref());
    if let Some(address) = &email {
        let well_formed = address
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed {
            return Err(IntakeViolation::InvalidEmail(address.clone()));
        }
    }

    Ok(ValidatedRegistration {
        event_id: EventId(event_id),
        cpf,
        full_name,
        email,
        municipality,
        state,
    })
}
