//! Bulk CSV import of a course's region quotas.

mod parser;

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::workflows::admission::admin::validate_draft;
use crate::workflows::admission::{
    AdmissionError, AdmissionService, CapacityStore, CourseId, NotificationDispatcher,
    QuotaDraft, QuotaImportSummary,
};

#[derive(Debug)]
pub enum QuotaImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, source: AdmissionError },
    Admission(AdmissionError),
}

impl QuotaImportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuotaImportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotaImportError::Csv(_) | QuotaImportError::Row { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            QuotaImportError::Admission(err) => err.status_code(),
        }
    }
}

impl fmt::Display for QuotaImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaImportError::Io(err) => write!(f, "failed to read quota file: {}", err),
            QuotaImportError::Csv(err) => write!(f, "invalid quota CSV data: {}", err),
            QuotaImportError::Row { line, source } => {
                write!(f, "quota row on line {} rejected: {}", line, source)
            }
            QuotaImportError::Admission(err) => {
                write!(f, "could not apply quotas to course: {}", err)
            }
        }
    }
}

impl std::error::Error for QuotaImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuotaImportError::Io(err) => Some(err),
            QuotaImportError::Csv(err) => Some(err),
            QuotaImportError::Row { source, .. } => Some(source),
            QuotaImportError::Admission(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for QuotaImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for QuotaImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<AdmissionError> for QuotaImportError {
    fn from(err: AdmissionError) -> Self {
        Self::Admission(err)
    }
}

/// Applies a `state,city,limit,waitlist_limit` CSV to one course.
///
/// Every row is validated before the store is touched, and the accepted rows are applied in a
/// single transaction: a file either lands completely or not at all.
pub struct QuotaImporter;

impl QuotaImporter {
    pub fn from_path<S, N, P>(
        service: &AdmissionService<S, N>,
        course: &CourseId,
        path: P,
    ) -> Result<QuotaImportSummary, QuotaImportError>
    where
        S: CapacityStore + 'static,
        N: NotificationDispatcher + 'static,
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        Self::from_reader(service, course, file)
    }

    pub fn from_reader<S, N, R>(
        service: &AdmissionService<S, N>,
        course: &CourseId,
        reader: R,
    ) -> Result<QuotaImportSummary, QuotaImportError>
    where
        S: CapacityStore + 'static,
        N: NotificationDispatcher + 'static,
        R: Read,
    {
        let drafts = Self::drafts(reader)?;
        Ok(service.import_region_quotas(course, drafts)?)
    }

    /// Parses and validates rows without applying them.
    pub fn drafts<R: Read>(reader: R) -> Result<Vec<QuotaDraft>, QuotaImportError> {
        parser::parse_records(reader)?
            .into_iter()
            .map(|record| {
                validate_draft(QuotaDraft {
                    state: record.state,
                    city: record.city,
                    limit: record.limit,
                    waitlist_limit: record.waitlist_limit,
                })
                .map_err(|source| QuotaImportError::Row {
                    line: record.line,
                    source,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct QuotaImportRequest {
    pub csv: String,
}

/// Router exposing `POST /api/v1/admin/courses/:course_id/quotas/import`.
pub fn quota_import_router<S, N>(service: Arc<AdmissionService<S, N>>) -> Router
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/admin/courses/:course_id/quotas/import",
            post(import_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn import_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    UrlPath(course_id): UrlPath<String>,
    axum::Json(request): axum::Json<QuotaImportRequest>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let course = CourseId(course_id);
    let reader = Cursor::new(request.csv.into_bytes());
    match QuotaImporter::from_reader(&*service, &course, reader) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (err.status_code(), axum::Json(payload)).into_response()
        }
    }
}
