//! The editing session: one signed-in user, one open project.
//!
//! [`Editor`] wires the synchronizer, tools, zoom, history, save queue,
//! collaboration and chat together. Every local layer change follows the same
//! path: mutate through the synchronizer, record a history command, queue a
//! full-project save and broadcast a layer op.

use crate::auth::AuthSession;
use crate::camera::Zoom;
use crate::canvas::{CanvasSurface, SurfaceEvent};
use crate::chat::{ChatEntry, ChatSession};
use crate::collaboration::{CollabMessage, CollaborationManager, RemoteChange};
use crate::config::ClientConfig;
use crate::history::{History, LayerCommand};
use crate::image::{ImageLoader, SourceLoader};
use crate::layer::{Layer, LayerContent, LayerId, LayerPatch, ShapeKind};
use crate::project::{NewProject, Project, User};
use crate::storage::{
    ApiResult, FlushReport, ImageUpload, ProjectApi, SaveQueue, SaveReason, TokenStore,
};
use crate::sync::{ChannelConnector, ChannelEvent, CollabChannel, ConnectionState, NativeConnector, collaboration_url};
use crate::synchronizer::{LoadReport, ShapeDefaults, Synchronizer, TextDefaults};
use crate::tools::{ToolController, ToolError, ToolKind};
use std::sync::Arc;

/// Editor session over a project backend.
pub struct Editor<A: ProjectApi> {
    config: ClientConfig,
    api: Arc<A>,
    auth: AuthSession,
    images: Box<dyn ImageLoader>,
    connector: Box<dyn ChannelConnector>,
    projects: Vec<Project>,
    current: Option<Project>,
    sync: Synchronizer,
    tools: ToolController,
    zoom: Zoom,
    history: History,
    saves: SaveQueue,
    collab: CollaborationManager,
    channel: Option<Box<dyn CollabChannel>>,
    chat: ChatSession,
}

impl<A: ProjectApi> Editor<A> {
    pub fn new(config: ClientConfig, api: Arc<A>, tokens: Box<dyn TokenStore>) -> Self {
        let images = Box::new(SourceLoader::new(config.timeout));
        Self {
            config,
            api,
            auth: AuthSession::new(tokens),
            images,
            connector: Box::new(NativeConnector),
            projects: Vec::new(),
            current: None,
            sync: Synchronizer::new(),
            tools: ToolController::new(),
            zoom: Zoom::new(),
            history: History::new(),
            saves: SaveQueue::new(),
            collab: CollaborationManager::new(format!("anonymous-{}", uuid::Uuid::new_v4().simple())),
            channel: None,
            chat: ChatSession::new(),
        }
    }

    pub fn with_image_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.images = loader;
        self
    }

    pub fn with_connector(mut self, connector: Box<dyn ChannelConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // --- Auth ---

    pub fn user(&self) -> Option<&User> {
        self.auth.user()
    }

    fn signed_in(&mut self) {
        if let Some(user) = self.auth.user() {
            self.collab.set_user_id(user.id.clone());
        }
    }

    /// Sign in and load the project list (list failures are only logged).
    pub async fn login(&mut self, email: &str, password: &str) -> ApiResult<User> {
        let user = self.auth.login(self.api.as_ref(), email, password).await?.clone();
        self.signed_in();
        self.refresh_projects_logged().await;
        Ok(user)
    }

    pub async fn register(&mut self, username: &str, email: &str, password: &str) -> ApiResult<User> {
        let user = self
            .auth
            .register(self.api.as_ref(), username, email, password)
            .await?
            .clone();
        self.signed_in();
        self.refresh_projects_logged().await;
        Ok(user)
    }

    /// Resume a session from the stored token. Returns whether it worked.
    pub async fn restore_session(&mut self) -> bool {
        if self.auth.restore(self.api.as_ref()).await.is_none() {
            return false;
        }
        self.signed_in();
        self.refresh_projects_logged().await;
        true
    }

    /// Sign out, close the project and its channel.
    pub fn logout(&mut self) {
        self.close_project();
        self.projects.clear();
        self.auth.logout();
    }

    // --- Projects ---

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub async fn refresh_projects(&mut self) -> ApiResult<&[Project]> {
        let token = self.auth.require_token()?;
        self.projects = self.api.list_projects(&token).await?;
        Ok(&self.projects)
    }

    async fn refresh_projects_logged(&mut self) {
        if let Err(e) = self.refresh_projects().await {
            log::error!("Error loading projects: {}", e);
        }
    }

    /// Create a project, add it to the list and open it.
    pub async fn create_project(&mut self, project: NewProject) -> ApiResult<LoadReport> {
        let token = self.auth.require_token()?;
        let created = self.api.create_project(&token, &project).await?;
        log::info!("Created project {} ({})", created.name, created.id);
        self.projects.push(created.clone());
        Ok(self.open_project(created).await)
    }

    /// Open a project by id, fetching it if it is not in the list.
    pub async fn open_project_by_id(&mut self, project_id: &str) -> ApiResult<LoadReport> {
        let token = self.auth.require_token()?;
        let project = self.api.get_project(&token, project_id).await?;
        Ok(self.open_project(project).await)
    }

    /// Load a project onto the surface and join its collaboration room.
    pub async fn open_project(&mut self, project: Project) -> LoadReport {
        self.close_project();
        let report = self.sync.load(&project, self.images.as_ref()).await;
        self.tools.apply(self.sync.surface_mut());
        self.sync.surface_mut().set_zoom(self.zoom.scale());
        self.connect_channel(&project.id);
        self.current = Some(project);
        report
    }

    fn connect_channel(&mut self, project_id: &str) {
        let url = match collaboration_url(&self.config.api_base_url, project_id) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("No collaboration for project {}: {}", project_id, e);
                return;
            }
        };
        match self.connector.connect(&url) {
            Ok(channel) => self.channel = Some(channel),
            Err(e) => log::warn!("Could not open collaboration channel: {}", e),
        }
    }

    /// Close the current project. Unsent saves are dropped.
    pub fn close_project(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.disconnect();
        }
        if let Some(project) = self.current.take() {
            log::debug!("Closing project {}", project.id);
        }
        self.sync.clear();
        self.history.clear();
        self.saves.clear();
        self.collab.reset();
    }

    pub async fn delete_project(&mut self, project_id: &str) -> ApiResult<()> {
        let token = self.auth.require_token()?;
        self.api.delete_project(&token, project_id).await?;
        self.projects.retain(|p| p.id != project_id);
        if self.current.as_ref().is_some_and(|p| p.id == project_id) {
            self.close_project();
        }
        Ok(())
    }

    /// The open project with its current layer list.
    pub fn current_project(&self) -> Option<Project> {
        let mut project = self.current.clone()?;
        project.layers = self.sync.store().to_vec();
        Some(project)
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn layers(&self) -> &[Layer] {
        self.sync.store().layers()
    }

    pub fn surface(&self) -> &CanvasSurface {
        self.sync.surface()
    }

    /// Direct manipulation entry point. Call [`Editor::process_canvas_events`]
    /// afterwards to sync the changes back into the layer records.
    pub fn surface_mut(&mut self) -> &mut CanvasSurface {
        self.sync.surface_mut()
    }

    // --- Local layer edits ---

    /// Record, persist and broadcast a change that has already been applied.
    fn commit(&mut self, command: LayerCommand, reason: SaveReason) {
        match &command {
            LayerCommand::Add { layer, .. } | LayerCommand::Update { after: layer, .. } => {
                self.collab.local_upsert(layer)
            }
            LayerCommand::Remove { layer, .. } => self.collab.local_delete(&layer.id),
        }
        self.history.record(command);
        self.queue_save(reason);
        self.send_outgoing();
    }

    fn queue_save(&mut self, reason: SaveReason) {
        if let Some(project) = self.current_project() {
            self.saves.enqueue(project, reason);
        }
    }

    fn added(&mut self, layer: Layer, reason: SaveReason) -> LayerId {
        let index = self.sync.store().position(&layer.id).unwrap_or(self.sync.store().len());
        let id = layer.id.clone();
        self.commit(LayerCommand::Add { index, layer }, reason);
        id
    }

    pub fn add_text_layer(&mut self) -> Option<LayerId> {
        self.add_text_layer_with(&TextDefaults::default())
    }

    pub fn add_text_layer_with(&mut self, defaults: &TextDefaults) -> Option<LayerId> {
        self.current.as_ref()?;
        match self.sync.add_text_layer(defaults) {
            Ok(layer) => Some(self.added(layer, SaveReason::LayerAdded)),
            Err(e) => {
                log::error!("Could not add text layer: {}", e);
                None
            }
        }
    }

    pub fn add_shape_layer(&mut self, kind: ShapeKind) -> Option<LayerId> {
        self.add_shape_layer_with(kind, &ShapeDefaults::for_kind(kind))
    }

    pub fn add_shape_layer_with(&mut self, kind: ShapeKind, defaults: &ShapeDefaults) -> Option<LayerId> {
        self.current.as_ref()?;
        match self.sync.add_shape_layer(kind, defaults) {
            Ok(layer) => Some(self.added(layer, SaveReason::LayerAdded)),
            Err(e) => {
                log::error!("Could not add shape layer: {}", e);
                None
            }
        }
    }

    /// Apply an attribute patch to a layer. Returns false if it does not exist.
    pub fn update_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> bool {
        if patch.is_empty() {
            return self.sync.layer(id).is_some();
        }
        let Some((before, after)) = self.sync.update_layer(id, patch) else {
            return false;
        };
        self.commit(LayerCommand::Update { before, after }, SaveReason::LayerModified);
        true
    }

    pub fn toggle_visible(&mut self, id: &LayerId) -> bool {
        let Some(visible) = self.sync.layer(id).map(|l| !l.visible) else {
            return false;
        };
        self.update_layer(id, &LayerPatch::visible(visible))
    }

    pub fn set_opacity(&mut self, id: &LayerId, opacity: f64) -> bool {
        self.update_layer(id, &LayerPatch::opacity(opacity))
    }

    pub fn remove_layer(&mut self, id: &LayerId) -> bool {
        let Some((index, layer)) = self.sync.remove_layer(id) else {
            return false;
        };
        self.commit(LayerCommand::Remove { index, layer }, SaveReason::LayerRemoved);
        true
    }

    /// Sync pending surface manipulations back into layer records.
    /// Returns how many records changed.
    pub fn process_canvas_events(&mut self) -> usize {
        let mut changed = 0;
        for event in self.sync.surface_mut().poll_events() {
            match event {
                SurfaceEvent::ObjectModified(object_id) => {
                    if let Some((before, after)) = self.sync.on_object_modified(object_id) {
                        self.commit(LayerCommand::Update { before, after }, SaveReason::LayerModified);
                        changed += 1;
                    }
                }
                SurfaceEvent::PathCreated(object_id) => {
                    if let Some(layer) = self.sync.on_path_created(object_id) {
                        self.added(layer, SaveReason::StrokeAdded);
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    /// Upload an image and place the returned layer on the surface.
    pub async fn upload_image(&mut self, upload: ImageUpload) -> ApiResult<Layer> {
        let token = self.auth.require_token()?;
        let project_id = match &self.current {
            Some(project) => project.id.clone(),
            None => return Err(crate::storage::ApiError::Storage("No project is open".to_string())),
        };
        let response = self.api.upload_image(&token, &project_id, &upload).await?;
        log::info!("{}", response.message);
        let layer = response.layer;
        match self.sync.insert_image_layer(layer.clone(), self.images.as_ref()).await {
            Ok(_) => {
                self.added(layer.clone(), SaveReason::ImageUploaded);
            }
            Err(e) => log::warn!("Uploaded layer not added: {}", e),
        }
        Ok(layer)
    }

    // --- History ---

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn replay(&mut self, command: LayerCommand, reason: SaveReason) -> bool {
        if let Err(e) = self.sync.apply(&command) {
            log::warn!("Could not {}: {}", reason.as_str(), e);
            return false;
        }
        match &command {
            LayerCommand::Add { layer, .. } | LayerCommand::Update { after: layer, .. } => {
                self.collab.local_upsert(layer)
            }
            LayerCommand::Remove { layer, .. } => self.collab.local_delete(&layer.id),
        }
        self.queue_save(reason);
        self.send_outgoing();
        true
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(inverse) => {
                let applied = self.replay(inverse, SaveReason::Undo);
                if !applied {
                    self.history.cancel_undo();
                }
                applied
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(command) => {
                let applied = self.replay(command, SaveReason::Redo);
                if !applied {
                    self.history.cancel_redo();
                }
                applied
            }
            None => false,
        }
    }

    // --- Tools and zoom ---

    pub fn tool(&self) -> ToolKind {
        self.tools.current()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool, self.sync.surface_mut());
        if self.current.is_some() {
            self.collab.local_tool(tool);
            self.send_outgoing();
        }
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.tools.set_brush_size(size, self.sync.surface_mut());
    }

    pub fn set_brush_color(&mut self, color: &str) -> Result<(), ToolError> {
        self.tools.set_brush_color(color, self.sync.surface_mut())
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn zoom_in(&mut self) -> u32 {
        let percent = self.zoom.zoom_in();
        self.sync.surface_mut().set_zoom(self.zoom.scale());
        percent
    }

    pub fn zoom_out(&mut self) -> u32 {
        let percent = self.zoom.zoom_out();
        self.sync.surface_mut().set_zoom(self.zoom.scale());
        percent
    }

    pub fn reset_zoom(&mut self) -> u32 {
        let percent = self.zoom.reset();
        self.sync.surface_mut().set_zoom(self.zoom.scale());
        percent
    }

    // --- Persistence ---

    pub fn pending_saves(&self) -> usize {
        self.saves.len()
    }

    /// Push queued project snapshots in the order they were made.
    pub async fn flush_saves(&mut self) -> FlushReport {
        let token = self.auth.token();
        self.saves.flush(self.api.as_ref(), token.as_deref()).await
    }

    // --- Collaboration ---

    pub fn collaboration(&self) -> &CollaborationManager {
        &self.collab
    }

    pub fn channel_state(&self) -> ConnectionState {
        self.channel
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.state())
    }

    pub fn send_cursor(&mut self, x: f64, y: f64) {
        self.collab.local_cursor(x, y);
        self.send_outgoing();
    }

    fn send_outgoing(&mut self) {
        let messages = self.collab.take_outgoing();
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        for message in messages {
            if let Err(e) = channel.send(&message) {
                log::debug!("Dropped {} message: {}", message.type_name(), e);
            }
        }
    }

    /// Drain the collaboration channel and apply winning remote layer ops.
    /// Returns how many remote changes were applied.
    pub async fn sync_collaboration(&mut self) -> usize {
        let events = match self.channel.as_mut() {
            Some(channel) => channel.poll_events(),
            None => return 0,
        };
        let mut applied = 0;
        for event in events {
            match event {
                ChannelEvent::Connected => log::info!("Collaboration channel connected"),
                ChannelEvent::Disconnected => log::warn!("Collaboration channel closed"),
                ChannelEvent::Error { message } => log::warn!("Collaboration channel error: {}", message),
                ChannelEvent::Message(message) => {
                    if self.apply_remote(message).await {
                        applied += 1;
                    }
                }
            }
        }
        self.send_outgoing();
        applied
    }

    async fn apply_remote(&mut self, message: CollabMessage) -> bool {
        log::debug!("Collaboration message: {}", message.type_name());
        match self.collab.receive(message) {
            Some(RemoteChange::Upsert(layer)) => {
                let stale_image = match (&layer.content, self.sync.layer(&layer.id).map(|l| &l.content)) {
                    (LayerContent::Image(new), Some(LayerContent::Image(old))) => {
                        old.src != new.src || !self.sync.has_image(&layer.id)
                    }
                    (LayerContent::Image(_), _) => true,
                    _ => false,
                };
                if stale_image {
                    if let Err(e) = self.sync.decode_image(&layer, self.images.as_ref()).await {
                        log::warn!("Could not load image for remote layer {}: {}", layer.id, e);
                    }
                }
                match self.sync.upsert_layer(layer) {
                    Ok(_) => true,
                    Err(e) => {
                        log::warn!("Remote upsert failed: {}", e);
                        false
                    }
                }
            }
            Some(RemoteChange::Delete(id)) => self.sync.remove_layer(&id).is_some(),
            None => false,
        }
    }

    // --- Chat ---

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub async fn send_chat(&mut self, input: &str) -> Option<ChatEntry> {
        self.chat.send(self.api.as_ref(), input).await.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BrushMode, ObjectKind};
    use crate::collaboration::LayerOp;
    use crate::image::{encode_data_url, png_bytes};
    use crate::layer::{LayerKind, ShapeData};
    use crate::storage::{MemoryApi, MemoryTokenStore};
    use crate::sync::LocalChannel;
    use crate::testing::block_on;
    use kurbo::Point;

    fn editor() -> (Editor<MemoryApi>, Arc<MemoryApi>, LocalChannel) {
        let api = Arc::new(MemoryApi::new());
        let channel = LocalChannel::new();
        let mut editor = Editor::new(ClientConfig::default(), api.clone(), Box::new(MemoryTokenStore::new()))
            .with_connector(Box::new(channel.clone()));
        block_on(editor.register("ann", "ann@example.com", "pw")).unwrap();
        (editor, api, channel)
    }

    fn editor_with_project() -> (Editor<MemoryApi>, Arc<MemoryApi>, LocalChannel) {
        let (mut editor, api, channel) = editor();
        block_on(editor.create_project(NewProject::new("Poster").with_size(800, 600))).unwrap();
        (editor, api, channel)
    }

    fn remote_upsert(user: &str, layer: Layer, clock: u64) -> CollabMessage {
        CollabMessage::LayerUpdate { user_id: user.to_string(), data: LayerOp::Upsert { layer, clock } }
    }

    #[test]
    fn test_create_project_opens_it() {
        let (editor, _api, channel) = editor_with_project();

        let project = editor.current_project().unwrap();
        assert_eq!((project.width, project.height), (800, 600));
        assert_eq!(editor.projects().len(), 1);
        assert_eq!(editor.surface().size().width, 800.0);
        assert_eq!(
            channel.connected_urls(),
            vec![format!("ws://localhost:8001/api/ws/collaborate/{}", project.id)]
        );
    }

    #[test]
    fn test_drag_text_layer_is_saved() {
        let (mut editor, api, _channel) = editor_with_project();
        let id = editor.add_text_layer().unwrap();
        let object_id = editor.synchronizer().object_for_layer(&id).unwrap().id();

        editor.surface_mut().move_object(object_id, Point::new(150.0, 120.0)).unwrap();
        assert_eq!(editor.process_canvas_events(), 1);

        let layer = editor.synchronizer().layer(&id).unwrap();
        assert_eq!((layer.x, layer.y), (150.0, 120.0));

        let report = block_on(editor.flush_saves());
        assert_eq!(report.sent.len(), 2);
        let saved = api.saved_projects().pop().unwrap();
        let saved_layer = saved.layers.iter().find(|l| l.id == id).unwrap();
        assert_eq!((saved_layer.x, saved_layer.y), (150.0, 120.0));
    }

    #[test]
    fn test_every_layer_change_queues_a_save() {
        let (mut editor, _api, _channel) = editor_with_project();
        let id = editor.add_shape_layer(ShapeKind::Rectangle).unwrap();
        editor.toggle_visible(&id);
        editor.set_opacity(&id, 0.5);

        assert_eq!(editor.pending_saves(), 3);
        assert!(!editor.synchronizer().object_for_layer(&id).unwrap().visible);
    }

    #[test]
    fn test_layer_ops_require_open_project() {
        let (mut editor, _api, _channel) = editor();
        assert!(editor.add_text_layer().is_none());
        assert_eq!(editor.pending_saves(), 0);
    }

    #[test]
    fn test_undo_redo_add() {
        let (mut editor, _api, _channel) = editor_with_project();
        let id = editor.add_shape_layer(ShapeKind::Circle).unwrap();

        assert!(editor.undo());
        assert!(editor.synchronizer().layer(&id).is_none());
        assert!(editor.surface().is_empty());

        assert!(editor.redo());
        assert!(editor.synchronizer().layer(&id).is_some());
        assert_eq!(editor.surface().len(), 1);
        assert!(!editor.redo());
    }

    #[test]
    fn test_undo_move_restores_object() {
        let (mut editor, _api, _channel) = editor_with_project();
        let id = editor.add_text_layer().unwrap();
        let object_id = editor.synchronizer().object_for_layer(&id).unwrap().id();
        editor.surface_mut().move_object(object_id, Point::new(400.0, 300.0)).unwrap();
        editor.process_canvas_events();

        assert!(editor.undo());
        let layer = editor.synchronizer().layer(&id).unwrap();
        assert_eq!((layer.x, layer.y), (100.0, 100.0));
        let object = editor.synchronizer().object_for_layer(&id).unwrap();
        assert_eq!(object.position, Point::new(100.0, 100.0));
    }

    #[test]
    fn test_undo_remove_restores_position() {
        let (mut editor, _api, _channel) = editor_with_project();
        let a = editor.add_shape_layer(ShapeKind::Rectangle).unwrap();
        let b = editor.add_shape_layer(ShapeKind::Circle).unwrap();
        let c = editor.add_text_layer().unwrap();

        assert!(editor.remove_layer(&b));
        assert!(editor.undo());

        let ids: Vec<&LayerId> = editor.layers().iter().map(|l| &l.id).collect();
        assert_eq!(ids, vec![&a, &b, &c]);
    }

    #[test]
    fn test_brush_stroke_becomes_layer() {
        let (mut editor, _api, _channel) = editor_with_project();
        editor.set_tool(ToolKind::Eraser);
        editor.set_brush_size(20.0);
        assert_eq!(editor.surface().brush().mode, BrushMode::Erase);

        let surface = editor.surface_mut();
        surface.begin_stroke(Point::new(10.0, 10.0)).unwrap();
        surface.extend_stroke(Point::new(50.0, 60.0)).unwrap();
        surface.end_stroke().unwrap();
        assert_eq!(editor.process_canvas_events(), 1);

        let layer = &editor.layers()[0];
        assert_eq!(layer.kind(), LayerKind::Brush);
        assert_eq!(layer.name, "Eraser Stroke");
        assert_eq!(editor.pending_saves(), 1);
    }

    #[test]
    fn test_reopen_restores_shapes_and_text() {
        let (mut editor, api, _channel) = editor_with_project();
        editor.add_text_layer().unwrap();
        editor.add_shape_layer(ShapeKind::Rectangle).unwrap();
        block_on(editor.flush_saves());
        let project_id = editor.current_project().unwrap().id;
        let expected = editor.layers().to_vec();

        let report = block_on(editor.open_project_by_id(&project_id)).unwrap();
        assert_eq!(report.restored, 2);
        assert_eq!(editor.layers(), expected.as_slice());
        assert_eq!(api.stored_project(&project_id).unwrap().layers, expected);
    }

    #[test]
    fn test_upload_image_adds_live_layer() {
        let (mut editor, api, _channel) = editor_with_project();
        let upload = ImageUpload {
            filename: "cat.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: png_bytes(30, 20),
        };

        let layer = block_on(editor.upload_image(upload)).unwrap();
        assert_eq!(layer.name, "Image Layer - cat.png");
        let object = editor.synchronizer().object_for_layer(&layer.id).unwrap();
        assert!(matches!(object.kind, ObjectKind::Image { .. }));
        assert_eq!(object.scaled_width(), 300.0);

        block_on(editor.flush_saves());
        let project_id = editor.current_project().unwrap().id;
        assert_eq!(api.stored_project(&project_id).unwrap().layers.len(), 1);
    }

    #[test]
    fn test_local_edits_are_broadcast() {
        let (mut editor, _api, channel) = editor_with_project();
        let id = editor.add_text_layer().unwrap();
        editor.set_tool(ToolKind::Brush);

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], CollabMessage::LayerUpdate { data, .. } if data.layer_id() == &id));
        assert!(matches!(&sent[1], CollabMessage::ToolChange { .. }));
    }

    #[test]
    fn test_remote_ops_apply_without_saving() {
        let (mut editor, _api, channel) = editor_with_project();
        let remote = Layer::new(
            LayerId::from("remote_1"),
            "Rectangle",
            LayerContent::Shape(ShapeData { shape: ShapeKind::Rectangle, fill: "#0000ff".to_string() }),
        )
        .with_size(50.0, 50.0);

        channel.push_incoming(remote_upsert("bob", remote.clone(), 1));
        assert_eq!(block_on(editor.sync_collaboration()), 1);
        assert!(editor.synchronizer().object_for_layer(&remote.id).is_some());
        assert_eq!(editor.pending_saves(), 0);
        assert!(!editor.can_undo());

        channel.push_incoming(CollabMessage::LayerUpdate {
            user_id: "bob".to_string(),
            data: LayerOp::Delete { layer_id: remote.id.clone(), clock: 2 },
        });
        assert_eq!(block_on(editor.sync_collaboration()), 1);
        assert!(editor.synchronizer().layer(&remote.id).is_none());
    }

    #[test]
    fn test_echoed_messages_are_ignored() {
        let (mut editor, _api, channel) = editor_with_project();
        editor.add_text_layer().unwrap();
        for message in channel.sent() {
            channel.push_incoming(message);
        }

        assert_eq!(block_on(editor.sync_collaboration()), 0);
        assert_eq!(editor.layers().len(), 1);
    }

    #[test]
    fn test_remote_image_layer_is_decoded() {
        let (mut editor, _api, channel) = editor_with_project();
        let src = encode_data_url("image/png", &png_bytes(10, 10));
        let layer = Layer::new(
            LayerId::from("img"),
            "Image",
            LayerContent::Image(crate::layer::ImageData { src, filename: None }),
        )
        .with_size(100.0, 100.0);

        channel.push_incoming(remote_upsert("bob", layer.clone(), 1));
        block_on(editor.sync_collaboration());
        assert_eq!(editor.synchronizer().object_for_layer(&layer.id).unwrap().scaled_width(), 100.0);
    }

    #[test]
    fn test_remote_image_source_change_is_decoded_again() {
        let (mut editor, _api, channel) = editor_with_project();
        let image = |width, height| {
            Layer::new(
                LayerId::from("img"),
                "Image",
                LayerContent::Image(crate::layer::ImageData {
                    src: encode_data_url("image/png", &png_bytes(width, height)),
                    filename: None,
                }),
            )
            .with_size(100.0, 100.0)
        };

        channel.push_incoming(remote_upsert("bob", image(10, 10), 1));
        channel.push_incoming(remote_upsert("bob", image(40, 20), 2));
        assert_eq!(block_on(editor.sync_collaboration()), 2);

        let object = editor.synchronizer().object_for_layer(&LayerId::from("img")).unwrap();
        assert!(matches!(object.kind, ObjectKind::Image { source_size, .. } if source_size == kurbo::Size::new(40.0, 20.0)));
        assert_eq!(object.scaled_width(), 100.0);
    }

    #[test]
    fn test_failed_undo_keeps_history() {
        let (mut editor, _api, channel) = editor_with_project();
        let id = editor.add_shape_layer(ShapeKind::Rectangle).unwrap();
        editor.set_opacity(&id, 0.5);

        // A collaborator deletes the layer before it is undone.
        channel.push_incoming(CollabMessage::LayerUpdate {
            user_id: "bob".to_string(),
            data: LayerOp::Delete { layer_id: id.clone(), clock: 10 },
        });
        assert_eq!(block_on(editor.sync_collaboration()), 1);

        assert!(!editor.undo());
        assert!(editor.can_undo());
        assert!(!editor.can_redo());
        assert!(editor.synchronizer().layer(&id).is_none());
    }

    #[test]
    fn test_invalid_shape_fill_is_not_added() {
        let (mut editor, _api, channel) = editor_with_project();
        let mut defaults = ShapeDefaults::for_kind(ShapeKind::Circle);
        defaults.fill = "notacolor".to_string();

        assert!(editor.add_shape_layer_with(ShapeKind::Circle, &defaults).is_none());
        assert!(editor.layers().is_empty());
        assert_eq!(editor.pending_saves(), 0);
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn test_zoom_is_view_only() {
        let (mut editor, _api, _channel) = editor_with_project();
        let id = editor.add_text_layer().unwrap();

        assert_eq!(editor.zoom_in(), 125);
        assert_eq!(editor.surface().zoom(), 1.25);
        assert_eq!(editor.synchronizer().layer(&id).unwrap().x, 100.0);
        assert_eq!(editor.reset_zoom(), 100);
    }

    #[test]
    fn test_logout_closes_everything() {
        let (mut editor, _api, channel) = editor_with_project();
        editor.add_text_layer().unwrap();
        editor.logout();

        assert!(editor.user().is_none());
        assert!(editor.current_project().is_none());
        assert!(editor.projects().is_empty());
        assert_eq!(editor.pending_saves(), 0);
        assert_eq!(editor.channel_state(), ConnectionState::Disconnected);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_restore_session_loads_projects() {
        let api = Arc::new(MemoryApi::new());
        let tokens = MemoryTokenStore::new();
        let mut first = Editor::new(ClientConfig::default(), api.clone(), Box::new(tokens))
            .with_connector(Box::new(LocalChannel::new()));
        block_on(first.register("ann", "ann@example.com", "pw")).unwrap();
        block_on(first.create_project(NewProject::new("Poster"))).unwrap();
        let token = first.auth.token().unwrap();

        let mut second = Editor::new(ClientConfig::default(), api, Box::new(MemoryTokenStore::with_token(token)))
            .with_connector(Box::new(LocalChannel::new()));
        assert!(block_on(second.restore_session()));
        assert_eq!(second.projects().len(), 1);
    }

    #[test]
    fn test_chat_through_editor() {
        let (mut editor, api, _channel) = editor();
        api.set_chat_reply(Some("Use contrast."));

        let reply = block_on(editor.send_chat("tips?")).unwrap();
        assert_eq!(reply.text, "Use contrast.");
        assert_eq!(editor.chat().messages().len(), 2);
    }
}
