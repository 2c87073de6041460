use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::server::types::ApiErrorType;
use crate::server::validation::{validate_upload, UploadError};
use crate::timetable::{self, TimetableError};
use crate::types::AppState;

/// Body of a successful upload.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub file_id: String,
    pub filename: String,
    pub size: usize,
    pub upload_time: DateTime<Utc>,
    /// The `data:text/calendar,` URI of the generated calendar.
    pub timetable: String,
}

/// The parts of the multipart form we care about.
#[derive(Default)]
struct UploadForm {
    filename: Option<String>,
    content_type: Option<String>,
    file: Option<Vec<u8>>,
    semester: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart {
            message: e.to_string(),
        })?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                form.filename = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| UploadError::Multipart {
                    message: e.to_string(),
                })?;
                form.file = Some(bytes.to_vec());
            }
            Some("semester") => {
                let text = field.text().await.map_err(|e| UploadError::Multipart {
                    message: e.to_string(),
                })?;
                form.semester = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Converts a TimetableError to an API response.
fn timetable_error_to_response(error: TimetableError) -> Response {
    let (status, message) = match &error {
        TimetableError::Format { .. } => (StatusCode::BAD_REQUEST, "Timetable format error"),
        TimetableError::Date { .. } => (
            StatusCode::BAD_REQUEST,
            "Semester start must be a Monday in YYYY-MM-DD form",
        ),
        TimetableError::CorruptArchive { .. } => {
            (StatusCode::BAD_REQUEST, "File is corrupt or not a spreadsheet")
        }
        TimetableError::Lookup { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to parse timetable",
        ),
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

fn upload_error_to_response(error: UploadError) -> Response {
    ApiErrorType::from((error.status_code(), "Invalid upload", Some(error.to_string())))
        .into_response()
}

/// POST /upload
///
/// Multipart form with a `file` (xls/xlsx export) and a `semester` start date.
/// Returns the generated calendar as a `data:` URI.
pub async fn post_upload(State(s): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            return upload_error_to_response(e);
        }
    };

    let Some(bytes) = form.file else {
        return upload_error_to_response(UploadError::MissingField { field: "file" });
    };
    let Some(semester) = form.semester else {
        return upload_error_to_response(UploadError::MissingField { field: "semester" });
    };
    let filename = form.filename.unwrap_or_default();
    let size = bytes.len();

    info!(filename = %filename, size, semester = %semester, "POST /upload");

    if let Err(e) = validate_upload(&filename, form.content_type.as_deref(), size, &s.server) {
        warn!(filename = %filename, error = %e, "Rejected upload");
        return upload_error_to_response(e);
    }

    let file_id = Uuid::new_v4().to_string();
    let settings = s.settings.clone();
    let result = tokio::task::spawn_blocking(move || {
        timetable::import_spreadsheet(&bytes, &semester, &settings)
            .map(|tt| tt.export_calendar())
    })
    .await;

    match result {
        Ok(Ok(export)) => {
            info!(file_id = %file_id, bytes = export.ics.len(), "Timetable exported");
            let response = FileResponse {
                file_id,
                filename,
                size,
                upload_time: Utc::now(),
                timetable: export.share_text,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(e)) => {
            warn!(file_id = %file_id, error = %e, "Timetable import failed");
            timetable_error_to_response(e)
        }
        Err(e) => {
            error!(file_id = %file_id, error = %e, "Timetable import task failed");
            ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export timetable",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }
}
