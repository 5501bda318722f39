//! REST endpoints under `/api`.

use crate::error::{ApiFailure, HandlerResult};
use crate::relay;
use crate::state::{AppState, ProjectChanges};
use axum::extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use pixelcrafter_core::collaboration::CollabMessage;
use pixelcrafter_core::image::MAX_IMAGE_BYTES;
use pixelcrafter_core::project::{NewProject, Project, User};
use pixelcrafter_core::storage::{
    AuthResponse, ChatHistory, ChatReply, ChatRequest, LoginRequest, RegisterRequest, UploadResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/{project_id}/upload-image", post(upload_image))
        .route("/api/projects/{project_id}/export", post(export_project))
        .route("/api/projects/{project_id}/filters/blur", post(blur_filter))
        .route("/api/projects/{project_id}/filters/brightness", post(brightness_filter))
        .route("/api/chat", post(chat))
        .route("/api/chat/history/{session_id}", get(chat_history))
        .route("/api/ws/collaborate/{project_id}", get(relay::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES as usize + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The user behind the request's bearer token.
pub struct AuthUser(pub User);

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiFailure::unauthorized("Not authenticated"))?;
        state.authenticate(token).map(AuthUser)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "PixelCrafter API" }))
}

async fn register(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> HandlerResult<Json<AuthResponse>> {
    state.register(&request).map(Json)
}

async fn login(
    State(state): State<SharedState>,
    Json(request): Json<LoginRequest>,
) -> HandlerResult<Json<AuthResponse>> {
    state.login(&request).map(Json)
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn list_projects(State(state): State<SharedState>, AuthUser(user): AuthUser) -> Json<Vec<Project>> {
    Json(state.list_projects(&user))
}

async fn create_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewProject>,
) -> Json<Project> {
    Json(state.create_project(&user, &request))
}

async fn get_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
) -> HandlerResult<Json<Project>> {
    state.get_project(&user, &project_id).map(Json)
}

async fn update_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
    Json(changes): Json<ProjectChanges>,
) -> HandlerResult<Json<Project>> {
    let (project, applied) = state.update_project(&user, &project_id, changes)?;

    let message = CollabMessage::ProjectUpdate {
        user_id: user.id.clone(),
        data: serde_json::to_value(&applied).unwrap_or(Value::Null),
    };
    match serde_json::to_string(&message) {
        Ok(text) => state.broadcast(&project_id, &user.id, text),
        Err(e) => tracing::warn!("Could not encode project update: {}", e),
    }
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
) -> HandlerResult<Json<Value>> {
    state.delete_project(&user, &project_id)?;
    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

async fn upload_image(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> HandlerResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::bad_request(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().unwrap_or("image/png").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiFailure::bad_request(format!("Invalid upload: {}", e)))?;
        let response = state.upload_image(&user, &project_id, &filename, &content_type, &bytes)?;
        tracing::info!("Uploaded {} ({} bytes) to project {}", filename, bytes.len(), project_id);
        return Ok(Json(response));
    }
    Err(ApiFailure::bad_request("Missing file field"))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default = "default_export_format")]
    format: String,
}

fn default_export_format() -> String {
    "png".to_string()
}

/// Project data for client-side rendering; the server does not rasterize.
async fn export_project(
    State(state): State<SharedState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> HandlerResult<Json<Value>> {
    let project = state.get_project(&user, &project_id)?;
    Ok(Json(json!({
        "project": project,
        "export_format": query.format,
        "message": "Project data ready for export",
    })))
}

#[derive(Debug, Deserialize)]
struct FilterQuery {
    layer_id: Option<String>,
    blur_amount: Option<f64>,
    brightness: Option<f64>,
}

impl FilterQuery {
    fn layer_id(&self) -> HandlerResult<&str> {
        self.layer_id
            .as_deref()
            .ok_or_else(|| ApiFailure::new(StatusCode::UNPROCESSABLE_ENTITY, "layer_id is required"))
    }
}

// Filters are acknowledged only; layer pixels are left untouched.
async fn blur_filter(
    AuthUser(_user): AuthUser,
    Path(_project_id): Path<String>,
    Query(query): Query<FilterQuery>,
) -> HandlerResult<Json<Value>> {
    let layer_id = query.layer_id()?;
    let amount = query.blur_amount.unwrap_or(5.0);
    Ok(Json(json!({
        "message": format!("Blur filter applied to layer {} with amount {:?}", layer_id, amount),
    })))
}

async fn brightness_filter(
    AuthUser(_user): AuthUser,
    Path(_project_id): Path<String>,
    Query(query): Query<FilterQuery>,
) -> HandlerResult<Json<Value>> {
    let layer_id = query.layer_id()?;
    let brightness = query.brightness.unwrap_or(1.2);
    Ok(Json(json!({
        "message": format!("Brightness filter applied to layer {} with value {:?}", layer_id, brightness),
    })))
}

async fn chat(State(state): State<SharedState>, Json(request): Json<ChatRequest>) -> HandlerResult<Json<ChatReply>> {
    state.chat(&request).map(Json)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    50
}

async fn chat_history(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<ChatHistory> {
    Json(state.chat_history(&session_id, query.limit))
}
