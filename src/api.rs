use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::commands::{self, Command, FilterStats, Reply, parse_integer};
use crate::error::BucketError;
use crate::types::{
    AppState, CommandRequest, ErrorResponse, InsertRequest, ReplyResponse,
    SetTimeRequest, SnapshotResponse, StatsResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        run_command,
        insert_item,
        check_item,
        advance_time,
        set_time,
        clear_bucket,
        filter_info,
        filter_stats,
        delete_filter,
        save_snapshot,
    ),
    components(
        schemas(
            CommandRequest, InsertRequest, SetTimeRequest, ReplyResponse,
            StatsResponse, SnapshotResponse, ErrorResponse, Reply, FilterStats
        )
    ),
    tags(
        (name = "bucket-filter", description = "Time-Bucketed Bloom Filter API")
    )
)]
struct ApiDoc;

fn error_response(err: BucketError) -> Response {
    let status = match err {
        BucketError::ArgumentCountMismatch { .. }
        | BucketError::ParseError { .. }
        | BucketError::InvalidArgument(_)
        | BucketError::UnknownCommand(_)
        | BucketError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        BucketError::TypeMismatch => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {err}");
    }
    (
        status,
        Json(ErrorResponse {
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// Runs a command off the async executor; clearing a bucket scans the whole
/// table.
async fn dispatch(state: Arc<AppState>, command: Command) -> Response {
    let joined = tokio::task::spawn_blocking(move || {
        commands::execute(&state.store, &command)
    })
    .await;

    match joined {
        Ok(Ok(reply)) => (StatusCode::OK, Json(ReplyResponse { reply })).into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(BucketError::StorageError(format!(
            "command task failed: {e}"
        ))),
    }
}

/// Check API health
#[utoipa::path(
    get,
    path = "/health",
    tag = "bucket-filter",
    responses(
        (status = 200, description = "API is healthy")
    )
)]
async fn health_check() -> impl IntoResponse {
    debug!("Health check");
    StatusCode::OK
}

/// Run a raw `BBF.*` command
#[utoipa::path(
    post,
    path = "/command",
    tag = "bucket-filter",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Command executed", body = ReplyResponse),
        (status = 400, description = "Malformed command", body = ErrorResponse),
        (status = 409, description = "Key holds another type", body = ErrorResponse)
    )
)]
async fn run_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    debug!("Running command: {:?}", &request.args);
    match Command::parse(&request.args) {
        Ok(command) => dispatch(state, command).await,
        Err(e) => error_response(e),
    }
}

/// Insert an item, creating the filter on first use
#[utoipa::path(
    post,
    path = "/filters/{key}/items",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    request_body = InsertRequest,
    responses(
        (status = 200, description = "Item inserted", body = ReplyResponse),
        (status = 409, description = "Key holds another type", body = ErrorResponse)
    )
)]
async fn insert_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<InsertRequest>,
) -> Response {
    let command = Command::Add {
        key: key.into_bytes(),
        item: request.value.into_bytes(),
    };
    dispatch(state, command).await
}

/// Check whether an item was seen
#[utoipa::path(
    get,
    path = "/filters/{key}/items/{value}",
    tag = "bucket-filter",
    params(
        ("key" = String, Path, description = "Filter key"),
        ("value" = String, Path, description = "Value to check")
    ),
    responses(
        (status = 200, description = "1 if present, 0 otherwise", body = ReplyResponse)
    )
)]
async fn check_item(
    State(state): State<Arc<AppState>>,
    Path((key, value)): Path<(String, String)>,
) -> Response {
    let command = Command::Exists {
        key: key.into_bytes(),
        item: value.into_bytes(),
    };
    dispatch(state, command).await
}

/// Advance the filter clock by one
#[utoipa::path(
    post,
    path = "/filters/{key}/time/advance",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    responses(
        (status = 200, description = "1 if advanced, 0 if absent", body = ReplyResponse)
    )
)]
async fn advance_time(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    dispatch(state, Command::IncTime { key: key.into_bytes() }).await
}

/// Set the filter clock
#[utoipa::path(
    put,
    path = "/filters/{key}/time",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    request_body = SetTimeRequest,
    responses(
        (status = 200, description = "1 if set, 0 if absent", body = ReplyResponse),
        (status = 400, description = "Negative time", body = ErrorResponse)
    )
)]
async fn set_time(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<SetTimeRequest>,
) -> Response {
    let command = Command::SetTime {
        key: key.into_bytes(),
        time: request.time,
    };
    dispatch(state, command).await
}

/// Clear every slot stamped with a bucket id
#[utoipa::path(
    delete,
    path = "/filters/{key}/buckets/{bucket}",
    tag = "bucket-filter",
    params(
        ("key" = String, Path, description = "Filter key"),
        ("bucket" = String, Path, description = "Bucket id, taken modulo 128")
    ),
    responses(
        (status = 200, description = "1 if cleared, 0 if absent", body = ReplyResponse),
        (status = 400, description = "Bucket is not an integer", body = ErrorResponse)
    )
)]
async fn clear_bucket(
    State(state): State<Arc<AppState>>,
    Path((key, bucket)): Path<(String, String)>,
) -> Response {
    let bucket = match parse_integer("bucket", bucket.as_bytes()) {
        Ok(bucket) => bucket,
        Err(e) => return error_response(e),
    };
    let command = Command::ClearTime {
        key: key.into_bytes(),
        bucket,
    };
    dispatch(state, command).await
}

/// Current clock of a filter
#[utoipa::path(
    get,
    path = "/filters/{key}",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    responses(
        (status = 200, description = "\"current time: N\" or 0 if absent", body = ReplyResponse)
    )
)]
async fn filter_info(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    dispatch(state, Command::Info { key: key.into_bytes() }).await
}

/// Table statistics of a filter
#[utoipa::path(
    get,
    path = "/filters/{key}/stats",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    responses(
        (status = 200, description = "Filter statistics", body = StatsResponse),
        (status = 404, description = "No filter under this key", body = ErrorResponse)
    )
)]
async fn filter_stats(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    let joined = tokio::task::spawn_blocking(move || {
        commands::stats(&state.store, key.as_bytes())
    })
    .await;

    match joined {
        Ok(Ok(Some(stats))) => {
            (StatusCode::OK, Json(StatsResponse { stats })).into_response()
        }
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                message: "no filter under this key".to_string(),
            }),
        )
            .into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(BucketError::StorageError(format!(
            "stats task failed: {e}"
        ))),
    }
}

/// Delete a filter and release its table
#[utoipa::path(
    delete,
    path = "/filters/{key}",
    tag = "bucket-filter",
    params(("key" = String, Path, description = "Filter key")),
    responses(
        (status = 200, description = "1 if freed, 0 if absent", body = ReplyResponse)
    )
)]
async fn delete_filter(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    dispatch(state, Command::Del { key: key.into_bytes() }).await
}

/// Write the whole store to the configured snapshot database
#[utoipa::path(
    post,
    path = "/snapshot",
    tag = "bucket-filter",
    responses(
        (status = 200, description = "Snapshot written", body = SnapshotResponse),
        (status = 400, description = "No snapshot path configured", body = ErrorResponse)
    )
)]
async fn save_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let joined = tokio::task::spawn_blocking(move || match &state.snapshots {
        Some(snapshots) => snapshots.save(&state.store),
        None => Err(BucketError::InvalidConfig(
            "no snapshot path configured".to_string(),
        )),
    })
    .await;

    match joined {
        Ok(Ok(filters)) => {
            (StatusCode::OK, Json(SnapshotResponse { filters })).into_response()
        }
        Ok(Err(e)) => error_response(e),
        Err(e) => error_response(BucketError::StorageError(format!(
            "snapshot task failed: {e}"
        ))),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi),
        )
        .route("/health", get(health_check))
        .route("/command", post(run_command))
        .route("/snapshot", post(save_snapshot))
        .route("/filters/{key}", get(filter_info).delete(delete_filter))
        .route("/filters/{key}/stats", get(filter_stats))
        .route("/filters/{key}/items", post(insert_item))
        .route("/filters/{key}/items/{value}", get(check_item))
        .route("/filters/{key}/time", put(set_time))
        .route("/filters/{key}/time/advance", post(advance_time))
        .route("/filters/{key}/buckets/{bucket}", delete(clear_bucket))
        .with_state(state)
}
