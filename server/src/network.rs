//! HTTP dispatcher: routes, auth, JSON validation, error mapping
//!
//! The dispatcher is deliberately thin. It validates everything that can be
//! validated without touching the world (method, bearer token shape, JSON
//! bodies, query bounds), then submits the operation to the API strand and
//! serializes the reply. Anything outside `/api/` is handed to the static
//! file service.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use shared::Direction;
use tower_http::services::ServeDir;

use crate::app::AppError;
use crate::records::RecordsRepository;
use crate::strand::StrandHandle;

/// Largest page the records endpoint will serve
const MAX_RECORDS_PAGE: u64 = 100;

/// Shared state of every API handler
#[derive(Clone)]
pub struct ApiState {
    pub strand: StrandHandle,
    pub records: Option<Arc<dyn RecordsRepository>>,
    pub auto_tick: bool,
}

/// Builds the complete router: API routes plus the static fallback
pub fn build_router(state: ApiState, www_root: &Path) -> Router {
    let api = Router::new()
        .route("/v1/game/join", post(join).fallback(post_only))
        .route("/v1/game/players", get(players).fallback(get_head_only))
        .route("/v1/game/state", get(game_state).fallback(get_head_only))
        .route("/v1/game/player/action", post(action).fallback(post_only))
        .route("/v1/game/tick", post(tick).fallback(post_only))
        .route("/v1/game/records", get(records).fallback(get_head_only))
        .route("/v1/maps", get(maps).fallback(get_head_only))
        .route("/v1/maps/{id}", get(map_info).fallback(get_head_only))
        .fallback(unknown_api_endpoint);

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(www_root))
        .with_state(state)
}

/// HTTP-facing wrapper that maps [`AppError`] kinds onto statuses
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken(_) | AppError::UnknownToken(_) => StatusCode::UNAUTHORIZED,
            AppError::MapNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            code: &'a str,
            message: String,
        }

        let mut response = json_response(
            status,
            &ErrorBody { code: self.0.code(), message: self.0.to_string() },
        );
        if let AppError::InvalidMethod { allow } = self.0 {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let body = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

fn bad_request(message: &str) -> ApiError {
    ApiError(AppError::InvalidArgument(message.to_string()))
}

/// Pulls the 32-hex bearer token out of the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let invalid = || {
        ApiError(AppError::InvalidToken(
            "Authorization header is missing or malformed".to_string(),
        ))
    };

    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(invalid)?;
    let token = value.strip_prefix("Bearer ").ok_or_else(invalid)?;
    if token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(token.to_string())
    } else {
        Err(invalid())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    user_name: String,
    map_id: String,
}

async fn join(State(state): State<ApiState>, body: String) -> Result<Response, ApiError> {
    let request: JoinRequest =
        serde_json::from_str(&body).map_err(|_| bad_request("Join game request parse error"))?;

    let info = state
        .strand
        .join_game(
            request.user_name.trim().to_string(),
            request.map_id.trim().to_string(),
        )
        .await?;
    Ok(json_response(StatusCode::OK, &info))
}

async fn players(State(state): State<ApiState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state.strand.get_players(token).await?;
    Ok(json_response(StatusCode::OK, &view))
}

async fn game_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state.strand.get_game_state(token).await?;
    Ok(json_response(StatusCode::OK, &view))
}

#[derive(Deserialize)]
struct ActionRequest {
    #[serde(rename = "move")]
    move_: String,
}

async fn action(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?;
    let request: ActionRequest =
        serde_json::from_str(&body).map_err(|_| bad_request("Failed to parse action"))?;

    let direction = match request.move_.as_str() {
        "" => None,
        letter => {
            Some(Direction::from_letter(letter).ok_or_else(|| bad_request("Invalid move value"))?)
        }
    };

    state.strand.action(token, direction).await?;
    Ok(json_response(StatusCode::OK, &serde_json::json!({})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickRequest {
    time_delta: i64,
}

async fn tick(State(state): State<ApiState>, body: String) -> Result<Response, ApiError> {
    if state.auto_tick {
        return Err(bad_request("Invalid endpoint"));
    }
    let request: TickRequest = serde_json::from_str(&body)
        .map_err(|_| bad_request("Failed to parse tick request JSON"))?;
    if request.time_delta < 0 {
        return Err(bad_request("Negative time delta"));
    }

    state
        .strand
        .tick(Duration::from_millis(request.time_delta as u64))
        .await?;
    Ok(json_response(StatusCode::OK, &serde_json::json!({})))
}

async fn maps(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let view = state.strand.get_maps().await?;
    Ok(json_response(StatusCode::OK, &view))
}

async fn map_info(
    State(state): State<ApiState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let view = state.strand.get_map(id).await?;
    Ok(json_response(StatusCode::OK, &view))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsQuery {
    start: Option<u64>,
    max_items: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    name: String,
    score: u32,
    /// Seconds
    play_time: f64,
}

async fn records(
    State(state): State<ApiState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| bad_request("Invalid records query"))?;
    let start = query.start.unwrap_or(0);
    let max_items = query.max_items.unwrap_or(MAX_RECORDS_PAGE);
    if max_items > MAX_RECORDS_PAGE {
        return Err(bad_request("maxItems must not exceed 100"));
    }

    let records = match &state.records {
        Some(repo) => repo
            .get_records(start, max_items)
            .await
            .map_err(|err| ApiError(AppError::Internal(err.to_string())))?,
        None => Vec::new(),
    };

    let view: Vec<RecordView> = records
        .into_iter()
        .map(|record| RecordView {
            name: record.name,
            score: record.score,
            play_time: record.play_time.as_secs_f64(),
        })
        .collect();
    Ok(json_response(StatusCode::OK, &view))
}

async fn unknown_api_endpoint() -> ApiError {
    bad_request("Unknown API endpoint")
}

async fn post_only() -> ApiError {
    ApiError(AppError::InvalidMethod { allow: "POST" })
}

async fn get_head_only() -> ApiError {
    ApiError(AppError::InvalidMethod { allow: "GET, HEAD" })
}
