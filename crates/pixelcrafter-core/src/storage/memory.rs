//! In-memory backend.

use super::{
    ApiError, ApiResult, AuthResponse, BoxFuture, ChatHistory, ChatRecord, ChatReply, ChatRequest,
    ImageUpload, LoginRequest, ProjectApi, RegisterRequest, UploadResponse,
};
use crate::image::encode_data_url;
use crate::layer::{ImageData, Layer, LayerContent, LayerId};
use crate::project::{NewProject, Project, User};
use std::collections::HashMap;
use std::sync::RwLock;

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    projects: Vec<Project>,
    saves: Vec<Project>,
    chats: HashMap<String, Vec<ChatRecord>>,
    chat_reply: Option<String>,
    offline: bool,
}

/// Backend that keeps everything in memory, for tests and offline use.
///
/// Behaves like the HTTP backend: the same status codes and `detail`
/// messages for the same failures. Every accepted project save is also
/// recorded so callers can inspect what was pushed and in which order.
#[derive(Default)]
pub struct MemoryApi {
    state: RwLock<State>,
}

fn lock_error<E: std::fmt::Display>(e: E) -> ApiError {
    ApiError::Storage(format!("Lock error: {}", e))
}

fn status(status: u16, detail: &str) -> ApiError {
    ApiError::Status { status, detail: detail.to_string() }
}

impl State {
    fn check_online(&self) -> ApiResult<()> {
        if self.offline {
            return Err(ApiError::Network("Connection refused".to_string()));
        }
        Ok(())
    }

    fn user_for(&self, token: &str) -> ApiResult<User> {
        self.check_online()?;
        let user_id = self
            .tokens
            .get(token)
            .ok_or_else(|| status(401, "Invalid authentication credentials"))?;
        self.accounts
            .values()
            .find(|a| &a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| status(401, "User not found"))
    }

    fn owned_project(&mut self, token: &str, project_id: &str) -> ApiResult<&mut Project> {
        let user = self.user_for(token)?;
        self.projects
            .iter_mut()
            .find(|p| p.id == project_id && p.owner_id == user.id)
            .ok_or_else(|| status(404, "Project not found"))
    }

    fn issue_token(&mut self, user: &User) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), user.id.clone());
        token
    }
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a network error until switched back.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.write() {
            state.offline = offline;
        }
    }

    /// Configure the assistant. `None` makes chat answer 503.
    pub fn set_chat_reply(&self, reply: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.chat_reply = reply.map(str::to_string);
        }
    }

    /// Every project body accepted by `update_project`, oldest first.
    pub fn saved_projects(&self) -> Vec<Project> {
        self.state.read().map(|s| s.saves.clone()).unwrap_or_default()
    }

    /// Current stored copy of a project, ignoring ownership.
    pub fn stored_project(&self, project_id: &str) -> Option<Project> {
        let state = self.state.read().ok()?;
        state.projects.iter().find(|p| p.id == project_id).cloned()
    }

    /// Store a project directly, bypassing authentication.
    pub fn insert_project(&self, project: Project) {
        if let Ok(mut state) = self.state.write() {
            state.projects.retain(|p| p.id != project.id);
            state.projects.push(project);
        }
    }
}

impl ProjectApi for MemoryApi {
    fn login(&self, request: &LoginRequest) -> BoxFuture<'_, ApiResult<AuthResponse>> {
        let request = request.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            state.check_online()?;
            let user = match state.accounts.get(&request.email) {
                Some(account) if account.password == request.password => account.user.clone(),
                _ => return Err(status(401, "Invalid credentials")),
            };
            let access_token = state.issue_token(&user);
            Ok(AuthResponse { access_token, token_type: "bearer".to_string(), user })
        })
    }

    fn register(&self, request: &RegisterRequest) -> BoxFuture<'_, ApiResult<AuthResponse>> {
        let request = request.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            state.check_online()?;
            if state.accounts.contains_key(&request.email) {
                return Err(status(400, "Email already registered"));
            }
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                username: request.username,
                email: request.email.clone(),
                created_at: None,
            };
            state
                .accounts
                .insert(request.email, Account { user: user.clone(), password: request.password });
            let access_token = state.issue_token(&user);
            Ok(AuthResponse { access_token, token_type: "bearer".to_string(), user })
        })
    }

    fn me(&self, token: &str) -> BoxFuture<'_, ApiResult<User>> {
        let token = token.to_string();
        Box::pin(async move {
            let state = self.state.read().map_err(lock_error)?;
            state.user_for(&token)
        })
    }

    fn list_projects(&self, token: &str) -> BoxFuture<'_, ApiResult<Vec<Project>>> {
        let token = token.to_string();
        Box::pin(async move {
            let state = self.state.read().map_err(lock_error)?;
            let user = state.user_for(&token)?;
            Ok(state.projects.iter().filter(|p| p.owner_id == user.id).cloned().collect())
        })
    }

    fn get_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<Project>> {
        let token = token.to_string();
        let project_id = project_id.to_string();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            state.owned_project(&token, &project_id).map(|p| p.clone())
        })
    }

    fn create_project(&self, token: &str, project: &NewProject) -> BoxFuture<'_, ApiResult<Project>> {
        let token = token.to_string();
        let new = project.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            let user = state.user_for(&token)?;
            let mut project = Project::new(uuid::Uuid::new_v4().to_string(), new.name);
            project.width = new.width;
            project.height = new.height;
            project.background_color = new.background_color;
            project.owner_id = user.id;
            state.projects.push(project.clone());
            Ok(project)
        })
    }

    fn update_project(&self, token: &str, project: &Project) -> BoxFuture<'_, ApiResult<Project>> {
        let token = token.to_string();
        let update = project.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            let stored = state.owned_project(&token, &update.id)?;
            let owner_id = stored.owner_id.clone();
            let created_at = stored.created_at.clone();
            *stored = Project { owner_id, created_at, ..update };
            let saved = stored.clone();
            state.saves.push(saved.clone());
            Ok(saved)
        })
    }

    fn delete_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<()>> {
        let token = token.to_string();
        let project_id = project_id.to_string();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            state.owned_project(&token, &project_id)?;
            state.projects.retain(|p| p.id != project_id);
            Ok(())
        })
    }

    fn upload_image(
        &self,
        token: &str,
        project_id: &str,
        upload: &ImageUpload,
    ) -> BoxFuture<'_, ApiResult<UploadResponse>> {
        let token = token.to_string();
        let project_id = project_id.to_string();
        let upload = upload.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            let project = state.owned_project(&token, &project_id)?;
            let content = LayerContent::Image(ImageData {
                src: encode_data_url(&upload.content_type, &upload.bytes),
                filename: Some(upload.filename.clone()),
            });
            let layer = Layer::new(
                LayerId::new(uuid::Uuid::new_v4().to_string()),
                format!("Image Layer - {}", upload.filename),
                content,
            )
            .with_size(300.0, 200.0)
            .with_z_index(project.layers.len() as i64);
            project.layers.push(layer.clone());
            Ok(UploadResponse { layer, message: "Image uploaded successfully".to_string() })
        })
    }

    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, ApiResult<ChatReply>> {
        let request = request.clone();
        Box::pin(async move {
            let mut state = self.state.write().map_err(lock_error)?;
            state.check_online()?;
            let reply = state
                .chat_reply
                .clone()
                .ok_or_else(|| status(503, "AI assistant is not configured"))?;
            state.chats.entry(request.session_id.clone()).or_default().push(ChatRecord {
                session_id: request.session_id.clone(),
                user_message: request.message,
                ai_response: reply.clone(),
                timestamp: None,
            });
            Ok(ChatReply { response: reply, session_id: request.session_id })
        })
    }

    fn chat_history(&self, session_id: &str) -> BoxFuture<'_, ApiResult<ChatHistory>> {
        let session_id = session_id.to_string();
        Box::pin(async move {
            let state = self.state.read().map_err(lock_error)?;
            state.check_online()?;
            let messages = state.chats.get(&session_id).cloned().unwrap_or_default();
            Ok(ChatHistory { messages })
        })
    }
}
