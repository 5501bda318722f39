//! In-memory backend state: accounts, sessions, projects, chat and rooms.

use crate::config::ServerConfig;
use crate::error::{ApiFailure, HandlerResult};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pixelcrafter_core::image::encode_data_url;
use pixelcrafter_core::layer::{ImageData, Layer, LayerContent, LayerId};
use pixelcrafter_core::project::{NewProject, Project, User};
use pixelcrafter_core::storage::{
    AuthResponse, ChatHistory, ChatRecord, ChatReply, ChatRequest, LoginRequest, RegisterRequest, UploadResponse,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tokio::sync::broadcast;
use uuid::Uuid;

/// How long a bearer token stays valid.
pub const SESSION_HOURS: i64 = 24;
/// Size given to uploaded image layers until the client resizes them.
pub const UPLOAD_LAYER_SIZE: (f64, f64) = (300.0, 200.0);
const CHANNEL_CAPACITY: usize = 256;

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Salted SHA-256 digest, hex encoded.
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Account {
    user: User,
    salt: String,
    password_hash: String,
}

impl Account {
    fn new(user: User, password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let password_hash = hash_password(&salt, password);
        Self { user, salt, password_hash }
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

struct Session {
    email: String,
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Fields a `PUT /api/projects/{id}` may change. Anything else in the body
/// (the client sends the whole record) is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<Layer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A collaboration room: one broadcast channel per project.
struct Room {
    /// (sender peer id, raw JSON text)
    tx: broadcast::Sender<(String, String)>,
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, peers: HashSet::new() }
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    /// Accounts by email.
    users: DashMap<String, Account>,
    /// Bearer token to session.
    sessions: DashMap<String, Session>,
    projects: DashMap<String, Project>,
    /// Chat exchanges by session id, oldest first.
    chats: DashMap<String, Vec<ChatRecord>>,
    rooms: DashMap<String, Room>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            users: DashMap::new(),
            sessions: DashMap::new(),
            projects: DashMap::new(),
            chats: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    // --- Auth ---

    fn issue_token(&self, user: &User) -> AuthResponse {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                email: user.email.clone(),
                user_id: user.id.clone(),
                expires_at: Utc::now() + Duration::hours(SESSION_HOURS),
            },
        );
        AuthResponse { access_token: token, token_type: "bearer".to_string(), user: user.clone() }
    }

    pub fn register(&self, request: &RegisterRequest) -> HandlerResult<AuthResponse> {
        let user = match self.users.entry(request.email.clone()) {
            Entry::Occupied(_) => return Err(ApiFailure::bad_request("Email already registered")),
            Entry::Vacant(slot) => {
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    username: request.username.clone(),
                    email: request.email.clone(),
                    created_at: Some(timestamp(Utc::now())),
                };
                slot.insert(Account::new(user.clone(), &request.password));
                user
            }
        };
        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(self.issue_token(&user))
    }

    pub fn login(&self, request: &LoginRequest) -> HandlerResult<AuthResponse> {
        let user = self
            .users
            .get(&request.email)
            .filter(|account| account.verify(&request.password))
            .map(|account| account.user.clone())
            .ok_or_else(|| ApiFailure::unauthorized("Invalid credentials"))?;
        Ok(self.issue_token(&user))
    }

    /// Resolve a bearer token to its user.
    pub fn authenticate(&self, token: &str) -> HandlerResult<User> {
        let invalid = || ApiFailure::unauthorized("Invalid authentication credentials");
        let (email, user_id) = {
            let session = self.sessions.get(token).ok_or_else(invalid)?;
            if session.expires_at <= Utc::now() {
                drop(session);
                self.sessions.remove(token);
                return Err(invalid());
            }
            (session.email.clone(), session.user_id.clone())
        };
        self.users
            .get(&email)
            .filter(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or_else(|| ApiFailure::unauthorized("User not found"))
    }

    // --- Projects ---

    pub fn list_projects(&self, owner: &User) -> Vec<Project> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|p| p.owner_id == owner.id)
            .map(|p| p.value().clone())
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        projects
    }

    pub fn get_project(&self, owner: &User, project_id: &str) -> HandlerResult<Project> {
        self.projects
            .get(project_id)
            .filter(|p| p.owner_id == owner.id)
            .map(|p| p.value().clone())
            .ok_or_else(ApiFailure::project_not_found)
    }

    pub fn create_project(&self, owner: &User, request: &NewProject) -> Project {
        let now = timestamp(Utc::now());
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            width: request.width,
            height: request.height,
            background_color: request.background_color.clone(),
            layers: Vec::new(),
            owner_id: owner.id.clone(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        self.projects.insert(project.id.clone(), project.clone());
        tracing::info!("Created project {} for {}", project.id, owner.id);
        project
    }

    /// Merge changes into a project. Returns the updated record and the
    /// applied changes (with the new `updated_at`).
    pub fn update_project(
        &self,
        owner: &User,
        project_id: &str,
        mut changes: ProjectChanges,
    ) -> HandlerResult<(Project, ProjectChanges)> {
        let mut project = self
            .projects
            .get_mut(project_id)
            .filter(|p| p.owner_id == owner.id)
            .ok_or_else(ApiFailure::project_not_found)?;

        let now = timestamp(Utc::now());
        changes.updated_at = Some(now.clone());
        if let Some(name) = &changes.name {
            project.name = name.clone();
        }
        if let Some(width) = changes.width {
            project.width = width;
        }
        if let Some(height) = changes.height {
            project.height = height;
        }
        if let Some(color) = &changes.background_color {
            project.background_color = color.clone();
        }
        if let Some(layers) = &changes.layers {
            project.layers = layers.clone();
        }
        project.updated_at = Some(now);
        Ok((project.clone(), changes))
    }

    pub fn delete_project(&self, owner: &User, project_id: &str) -> HandlerResult<()> {
        self.projects
            .remove_if(project_id, |_, p| p.owner_id == owner.id)
            .map(|_| ())
            .ok_or_else(ApiFailure::project_not_found)
    }

    /// Store an uploaded image as a new image layer on top of the project.
    pub fn upload_image(
        &self,
        owner: &User,
        project_id: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> HandlerResult<UploadResponse> {
        let mut project = self
            .projects
            .get_mut(project_id)
            .filter(|p| p.owner_id == owner.id)
            .ok_or_else(ApiFailure::project_not_found)?;

        let subtype = content_type.rsplit('/').next().unwrap_or("png");
        let (width, height) = UPLOAD_LAYER_SIZE;
        let layer = Layer::new(
            LayerId::new(Uuid::new_v4().to_string()),
            format!("Image Layer - {}", filename),
            LayerContent::Image(ImageData {
                src: encode_data_url(&format!("image/{}", subtype), bytes),
                filename: Some(filename.to_string()),
            }),
        )
        .with_size(width, height)
        .with_z_index(project.layers.len() as i64);

        project.layers.push(layer.clone());
        project.updated_at = Some(timestamp(Utc::now()));
        Ok(UploadResponse { layer, message: "Image uploaded successfully".to_string() })
    }

    // --- Chat ---

    pub fn chat(&self, request: &ChatRequest) -> HandlerResult<ChatReply> {
        let Some(reply) = self.config.assistant_reply.clone() else {
            return Err(ApiFailure::new(StatusCode::SERVICE_UNAVAILABLE, "AI assistant is not configured"));
        };
        self.chats.entry(request.session_id.clone()).or_default().push(ChatRecord {
            session_id: request.session_id.clone(),
            user_message: request.message.clone(),
            ai_response: reply.clone(),
            timestamp: Some(timestamp(Utc::now())),
        });
        Ok(ChatReply { response: reply, session_id: request.session_id.clone() })
    }

    /// The latest `limit` exchanges, oldest first.
    pub fn chat_history(&self, session_id: &str, limit: usize) -> ChatHistory {
        let messages = self
            .chats
            .get(session_id)
            .map(|records| {
                let start = records.len().saturating_sub(limit);
                records[start..].to_vec()
            })
            .unwrap_or_default();
        ChatHistory { messages }
    }

    // --- Rooms ---

    /// Add a peer to a project's room.
    pub fn join_room(&self, project_id: &str, peer_id: &str) -> broadcast::Receiver<(String, String)> {
        let mut room = self.rooms.entry(project_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        room.tx.subscribe()
    }

    /// Remove a peer; empty rooms are dropped.
    pub fn leave_room(&self, project_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(project_id) {
            room.peers.remove(peer_id);
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(project_id);
            }
        }
    }

    pub fn room_size(&self, project_id: &str) -> usize {
        self.rooms.get(project_id).map_or(0, |room| room.peers.len())
    }

    /// Relay a message to every peer in the room except `from`.
    pub fn broadcast(&self, project_id: &str, from: &str, text: String) {
        if let Some(room) = self.rooms.get(project_id) {
            let _ = room.tx.send((from.to_string(), text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(ServerConfig::default())
    }

    fn register(state: &AppState, email: &str) -> AuthResponse {
        state
            .register(&RegisterRequest {
                username: "ann".to_string(),
                email: email.to_string(),
                password: "pw".to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_hash_depends_on_salt() {
        assert_eq!(hash_password("a", "pw"), hash_password("a", "pw"));
        assert_ne!(hash_password("a", "pw"), hash_password("b", "pw"));
        assert_eq!(hash_password("a", "pw").len(), 64);
    }

    #[test]
    fn test_register_then_login() {
        let state = state();
        let registered = register(&state, "ann@example.com");

        let login = state
            .login(&LoginRequest { email: "ann@example.com".to_string(), password: "pw".to_string() })
            .unwrap();
        assert_eq!(login.user.id, registered.user.id);
        assert_ne!(login.access_token, registered.access_token);
        assert_eq!(state.authenticate(&login.access_token).unwrap().email, "ann@example.com");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let state = state();
        register(&state, "ann@example.com");
        let err = state
            .register(&RegisterRequest {
                username: "other".to_string(),
                email: "ann@example.com".to_string(),
                password: "x".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "Email already registered");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let state = state();
        register(&state, "ann@example.com");
        let err = state
            .login(&LoginRequest { email: "ann@example.com".to_string(), password: "nope".to_string() })
            .unwrap_err();
        assert_eq!(err.detail, "Invalid credentials");
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = state().authenticate("missing").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_projects_are_owner_scoped() {
        let state = state();
        let ann = register(&state, "ann@example.com").user;
        let bob = register(&state, "bob@example.com").user;
        let project = state.create_project(&ann, &NewProject::new("Poster"));

        assert_eq!(state.list_projects(&ann).len(), 1);
        assert!(state.list_projects(&bob).is_empty());
        assert_eq!(state.get_project(&bob, &project.id).unwrap_err().detail, "Project not found");
        assert!(state.delete_project(&bob, &project.id).is_err());
        assert!(state.delete_project(&ann, &project.id).is_ok());
        assert!(state.get_project(&ann, &project.id).is_err());
    }

    #[test]
    fn test_update_merges_fields() {
        let state = state();
        let ann = register(&state, "ann@example.com").user;
        let project = state.create_project(&ann, &NewProject::new("Poster"));

        let changes = ProjectChanges { name: Some("Flyer".to_string()), ..Default::default() };
        let (updated, applied) = state.update_project(&ann, &project.id, changes).unwrap();
        assert_eq!(updated.name, "Flyer");
        assert_eq!(updated.width, 1920);
        assert!(applied.updated_at.is_some());
        assert_eq!(updated.updated_at, applied.updated_at);
    }

    #[test]
    fn test_upload_appends_image_layer() {
        let state = state();
        let ann = register(&state, "ann@example.com").user;
        let project = state.create_project(&ann, &NewProject::new("Poster"));

        let first = state.upload_image(&ann, &project.id, "a.png", "image/png", b"abc").unwrap();
        let second = state.upload_image(&ann, &project.id, "b.jpg", "image/jpeg", b"def").unwrap();

        assert_eq!(first.layer.name, "Image Layer - a.png");
        assert_eq!((first.layer.width, first.layer.height), (300.0, 200.0));
        assert_eq!((first.layer.z_index, second.layer.z_index), (0, 1));
        match &second.layer.content {
            LayerContent::Image(data) => assert!(data.src.starts_with("data:image/jpeg;base64,")),
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(state.get_project(&ann, &project.id).unwrap().layers.len(), 2);
    }

    #[test]
    fn test_chat_unconfigured() {
        let err = state()
            .chat(&ChatRequest { message: "hi".to_string(), session_id: "s".to_string() })
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_chat_history_is_limited_and_ordered() {
        let config = ServerConfig { assistant_reply: Some("ok".to_string()), ..Default::default() };
        let state = AppState::new(config);
        for message in ["one", "two", "three"] {
            state
                .chat(&ChatRequest { message: message.to_string(), session_id: "s".to_string() })
                .unwrap();
        }

        let history = state.chat_history("s", 2);
        let messages: Vec<&str> = history.messages.iter().map(|m| m.user_message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert!(state.chat_history("other", 50).messages.is_empty());
    }

    #[test]
    fn test_empty_rooms_are_removed() {
        let state = state();
        let _a = state.join_room("p1", "a");
        let _b = state.join_room("p1", "b");
        assert_eq!(state.room_size("p1"), 2);

        state.leave_room("p1", "a");
        state.leave_room("p1", "b");
        assert_eq!(state.room_size("p1"), 0);
    }

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let state = state();
        let mut rx = state.join_room("p1", "a");
        state.broadcast("p1", "b", "{}".to_string());
        assert_eq!(rx.try_recv().unwrap(), ("b".to_string(), "{}".to_string()));
    }

    #[test]
    fn test_room_relays_with_sender_and_is_dropped_when_empty() {
        let state = state();
        let mut ann = state.join_room("p1", "ann");
        let mut bob = state.join_room("p1", "bob");
        assert_eq!(state.room_size("p1"), 2);

        state.broadcast("p1", "ann", "{}".to_string());
        assert_eq!(bob.try_recv().unwrap(), ("ann".to_string(), "{}".to_string()));
        // Peers see their own frames tagged with their id and skip them.
        assert_eq!(ann.try_recv().unwrap().0, "ann");

        state.leave_room("p1", "ann");
        assert!(state.rooms.contains_key("p1"));
        state.leave_room("p1", "bob");
        assert!(!state.rooms.contains_key("p1"));

        // Broadcasting into a removed room is a no-op.
        state.broadcast("p1", "ann", "{}".to_string());
    }
}
