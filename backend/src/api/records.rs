//! Handlers of the `/api/emissions/` collection.
//!
//! SQLite calls block, so every handler hops onto the blocking pool.

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use tokio::task::JoinError;

use super::server::AppState;
use super::types::{ImportResponse, StatsQuery};
use crate::analytics::DashboardStats;
use crate::db::RecordQuery;
use crate::error::{ImportError, ServerError, ServerResult};
use crate::import::{import_upload, CsvUpload};
use crate::models::{EmissionRecord, RecordInput, RecordPatch};

/// Multipart field carrying the CSV.
const FILE_FIELD: &str = "file";

async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// Import failures keep the CSV error wording, even when the worker panics.
fn import_task_failure(err: JoinError) -> ImportError {
    ImportError::Task(err.to_string())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ServerResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<RecordQuery>,
) -> ServerResult<Json<Vec<EmissionRecord>>> {
    let records = blocking(move || Ok(state.db.list(&query)?)).await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<EmissionRecord>)> {
    let input = json_body(payload)?;
    let record = blocking(move || Ok(state.db.create(input)?)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ServerResult<Json<EmissionRecord>> {
    let record = blocking(move || Ok(state.db.get(id)?)).await?;
    Ok(Json(record))
}

pub async fn replace_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> ServerResult<Json<EmissionRecord>> {
    let input = json_body(payload)?;
    let record = blocking(move || Ok(state.db.update(id, input)?)).await?;
    Ok(Json(record))
}

pub async fn patch_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> ServerResult<Json<EmissionRecord>> {
    let patch = json_body(payload)?;
    let record = blocking(move || {
        let current = state.db.get(id)?;
        Ok(state.db.update(id, patch.merge(&current))?)
    })
    .await?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ServerResult<StatusCode> {
    blocking(move || Ok(state.db.delete(id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/emissions/import_csv/`
pub async fn import_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<ImportResponse>)> {
    let mut upload: Option<CsvUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        upload = Some(CsvUpload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    let outcome = tokio::task::spawn_blocking(move || import_upload(&state.db, upload))
        .await
        .map_err(import_task_failure)??;
    let status = ImportResponse::status_for(&outcome);
    Ok((status, Json(ImportResponse::from(outcome))))
}

/// `GET /api/emissions/stats/`
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ServerResult<Json<DashboardStats>> {
    let top = query.top();
    let stats = blocking(move || {
        let records = state.db.list(&RecordQuery::default())?;
        Ok(DashboardStats::compute(&records, top))
    })
    .await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_crashed_import_worker_is_a_csv_failure() {
        let join_err = tokio::task::spawn_blocking(|| panic!("worker crashed"))
            .await
            .unwrap_err();

        let err = ServerError::from(import_task_failure(join_err));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Failed to process CSV: "));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
