use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::AppState;
use crate::dispatch::{DispatchOutcome, Upload, WorkOrder};
use crate::insights::Insights;
use crate::pipeline::WorkResult;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CompletedResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    pub transcript: String,
    pub insights: Insights,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub success: bool,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub state: String,
    pub result: Option<WorkResult>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Multipart intake
// ============================================================================

/// Fields accepted by the submission endpoints.
#[derive(Debug, Default)]
struct SubmissionFields {
    upload: Option<Upload>,
    audio_url: Option<String>,
    transcript: Option<String>,
    audio_id: Option<String>,
}

async fn read_submission(multipart: &mut Multipart) -> Result<SubmissionFields, String> {
    let mut fields = SubmissionFields::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return Err(format!("Failed to read multipart: {}", e)),
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read audio field: {}", e))?;
                fields.upload = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("audio_url") => {
                fields.audio_url = field.text().await.ok().filter(|s| !s.is_empty());
            }
            Some("transcript") => {
                fields.transcript = field.text().await.ok();
            }
            Some("audio_id") => {
                fields.audio_id = field.text().await.ok().filter(|s| !s.is_empty());
            }
            other => {
                warn!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(fields)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/process
/// Transcribe an uploaded file or a remote URL and build insights.
pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let fields = match read_submission(&mut multipart).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Bad process request");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    if fields.upload.is_none() && fields.audio_url.is_none() {
        return error_response(StatusCode::BAD_REQUEST, "missing_audio_url_or_audio");
    }

    let order = WorkOrder {
        transcript: None,
        upload: fields.upload,
        audio_url: fields.audio_url,
    };

    match state.dispatcher.dispatch(order).await {
        Ok(DispatchOutcome::Completed(result)) => (
            StatusCode::OK,
            Json(CompletedResponse {
                success: true,
                audio_id: None,
                transcript: result.transcript,
                insights: result.insights,
            }),
        )
            .into_response(),
        Ok(DispatchOutcome::Queued { job_id }) => {
            info!(job_id = %job_id, "Processing queued");
            (
                StatusCode::OK,
                Json(QueuedResponse {
                    success: true,
                    queued: true,
                    audio_id: None,
                    job_id: job_id.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            // Internal detail stays in the logs.
            error!(error = %e, "Processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "process_failed")
        }
    }
}

/// POST /api/finalize
/// Finish a client-side session: an accumulated transcript plus an optional
/// trailing audio chunk. A bare request still yields insights on the empty
/// transcript.
pub async fn finalize_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let fields = match read_submission(&mut multipart).await {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Bad finalize request");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    let audio_id = fields
        .audio_id
        .unwrap_or_else(|| format!("rest-{}", Uuid::new_v4()));

    let order = WorkOrder {
        transcript: Some(fields.transcript.unwrap_or_default()),
        upload: fields.upload,
        audio_url: None,
    };

    match state.dispatcher.dispatch(order).await {
        Ok(DispatchOutcome::Completed(result)) => (
            StatusCode::OK,
            Json(CompletedResponse {
                success: true,
                audio_id: Some(audio_id),
                transcript: result.transcript,
                insights: result.insights,
            }),
        )
            .into_response(),
        Ok(DispatchOutcome::Queued { job_id }) => (
            StatusCode::OK,
            Json(QueuedResponse {
                success: true,
                queued: true,
                audio_id: Some(audio_id),
                job_id: job_id.to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Finalize failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "finalize_failed")
        }
    }
}

/// GET /jobs/:job_id
/// Query a queued job. Purged and never-existed ids are both 404.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&job_id) else {
        return error_response(StatusCode::NOT_FOUND, "not_found");
    };

    let Some(queue) = &state.queue else {
        return error_response(StatusCode::NOT_FOUND, "not_found");
    };

    match queue.fetch_result(id).await {
        Some(snapshot) => (
            StatusCode::OK,
            Json(JobStatusResponse {
                id: snapshot.id.to_string(),
                state: snapshot.state.as_str().to_string(),
                result: snapshot.result,
            }),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found"),
    }
}

/// GET /health
/// Dependency-free liveness probe, unauthenticated.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}
