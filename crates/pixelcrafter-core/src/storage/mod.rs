//! Remote project store, session tokens and the save queue.

mod http;
mod memory;
mod save_queue;
mod token;

pub use http::HttpApi;
pub use memory::MemoryApi;
pub use save_queue::{FlushReport, PendingSave, SaveQueue, SaveReason};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError, TokenStoreResult};

use crate::layer::Layer;
use crate::project::{NewProject, Project, User};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// API errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The request never got a response.
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-success status.
    #[error("{detail} (HTTP {status})")]
    Status { status: u16, detail: String },
    /// No session token is available for an authenticated call.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the credentials or token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated) || self.status() == Some(401)
    }

    /// Message suitable for showing to the user.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Token and user returned by login and register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub user: User,
}

fn bearer() -> String {
    "bearer".to_string()
}

/// A file to upload as a new image layer.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Server answer to an upload: a ready-made layer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub layer: Layer,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
}

/// One stored exchange with the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatRecord>,
}

/// Body of every error response: `{ "detail": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: serde_json::Value::String(detail.into()) }
    }

    /// The detail as text (validation errors arrive as structured JSON).
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// The REST API the editor talks to.
///
/// Every method maps to one endpoint. Authenticated calls take the bearer
/// token explicitly; the caller decides where it comes from.
pub trait ProjectApi: Send + Sync {
    /// `POST /api/auth/login`
    fn login(&self, request: &LoginRequest) -> BoxFuture<'_, ApiResult<AuthResponse>>;

    /// `POST /api/auth/register`
    fn register(&self, request: &RegisterRequest) -> BoxFuture<'_, ApiResult<AuthResponse>>;

    /// `GET /api/auth/me`
    fn me(&self, token: &str) -> BoxFuture<'_, ApiResult<User>>;

    /// `GET /api/projects`
    fn list_projects(&self, token: &str) -> BoxFuture<'_, ApiResult<Vec<Project>>>;

    /// `GET /api/projects/{id}`
    fn get_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<Project>>;

    /// `POST /api/projects`
    fn create_project(&self, token: &str, project: &NewProject) -> BoxFuture<'_, ApiResult<Project>>;

    /// `PUT /api/projects/{id}` with the whole project record.
    fn update_project(&self, token: &str, project: &Project) -> BoxFuture<'_, ApiResult<Project>>;

    /// `DELETE /api/projects/{id}`
    fn delete_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<()>>;

    /// `POST /api/projects/{id}/upload-image` (multipart)
    fn upload_image(
        &self,
        token: &str,
        project_id: &str,
        upload: &ImageUpload,
    ) -> BoxFuture<'_, ApiResult<UploadResponse>>;

    /// `POST /api/chat`
    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, ApiResult<ChatReply>>;

    /// `GET /api/chat/history/{session_id}`
    fn chat_history(&self, session_id: &str) -> BoxFuture<'_, ApiResult<ChatHistory>>;
}
