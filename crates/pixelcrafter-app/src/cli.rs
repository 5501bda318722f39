// ============================================================================
// PixelCrafter CLI: drives the editor headlessly against a backend
// ============================================================================
//
// Usage examples:
//   pixelcrafter register --username ann --email ann@example.com --password secret
//   pixelcrafter new "Poster" --width 800 --height 600
//   pixelcrafter add-text <project> --text "Sale" --font-size 48
//   pixelcrafter add-shape <project> circle --fill "#3366ff"
//   pixelcrafter set-layer <project> <layer> --opacity 0.5
//   pixelcrafter upload <project> photo.png
//   pixelcrafter watch <project> --seconds 30

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use kurbo::Point;

use crate::format::{flush_summary, layer_line, object_line, project_line};
use pixelcrafter_core::chat::{ChatSender, ChatSession};
use pixelcrafter_core::color::is_valid_color;
use pixelcrafter_core::config::ClientConfig;
use pixelcrafter_core::editor::Editor;
use pixelcrafter_core::layer::{LayerId, LayerPatch, ShapeKind};
use pixelcrafter_core::project::NewProject;
use pixelcrafter_core::storage::{ApiError, FileTokenStore, HttpApi, ImageUpload, TokenStore};
use pixelcrafter_core::synchronizer::{ShapeDefaults, TextDefaults};

/// PixelCrafter command-line editor.
#[derive(Parser, Debug)]
#[command(name = "pixelcrafter", version, about = "Edit PixelCrafter projects from the terminal")]
pub struct Cli {
    /// Backend base URL (overrides PIXELCRAFTER_BACKEND_URL).
    #[arg(long, global = true, value_name = "URL")]
    pub backend: Option<String>,

    /// Session token file (overrides PIXELCRAFTER_TOKEN_FILE).
    #[arg(long, global = true, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List your projects.
    Projects,
    /// Create a project.
    New {
        name: String,
        #[arg(long, default_value_t = 1920)]
        width: u32,
        #[arg(long, default_value_t = 1080)]
        height: u32,
        #[arg(long, default_value = "#ffffff")]
        background: String,
    },
    /// Delete a project.
    Delete { project: String },
    /// Open a project and print its layers and live objects.
    Show { project: String },
    /// Add a text layer.
    AddText {
        project: String,
        #[arg(long, default_value = "New Text")]
        text: String,
        #[arg(long, default_value_t = 20.0)]
        font_size: f64,
        #[arg(long, default_value = "#000000", value_parser = parse_color)]
        color: String,
        #[arg(long, default_value_t = 100.0)]
        x: f64,
        #[arg(long, default_value_t = 100.0)]
        y: f64,
    },
    /// Add a rectangle or circle layer.
    AddShape {
        project: String,
        shape: ShapeArg,
        /// Fill colour; defaults to red for rectangles, green for circles.
        #[arg(long, value_parser = parse_color)]
        fill: Option<String>,
    },
    /// Change a layer's name, visibility or opacity.
    SetLayer {
        project: String,
        layer: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        visible: Option<bool>,
        /// 0.0 to 1.0
        #[arg(long)]
        opacity: Option<f64>,
    },
    /// Upload an image file as a new layer.
    Upload { project: String, file: PathBuf },
    /// Ask the design assistant.
    Chat {
        message: String,
        /// Continue an existing conversation.
        #[arg(long)]
        session: Option<String>,
    },
    /// Print collaboration traffic for a project.
    Watch {
        project: String,
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeArg {
    Rectangle,
    Circle,
}

impl From<ShapeArg> for ShapeKind {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Rectangle => ShapeKind::Rectangle,
            ShapeArg::Circle => ShapeKind::Circle,
        }
    }
}

/// Content type for an upload, from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

/// Client configuration from the environment, then command-line flags.
pub fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(backend) = &cli.backend {
        config.api_base_url = backend.clone();
    }
    if let Some(path) = &cli.token_file {
        config.token_file = Some(path.clone());
    }
    config
}

fn token_store(config: &ClientConfig) -> Result<FileTokenStore, String> {
    match &config.token_file {
        Some(path) => Ok(FileTokenStore::new(path.clone())),
        None => FileTokenStore::default_location().map_err(|e| e.to_string()),
    }
}

type CliResult = Result<(), String>;

fn api_error(action: &str, error: ApiError) -> String {
    match error {
        ApiError::NotAuthenticated => format!("{}: not signed in (run `pixelcrafter login`)", action),
        other => format!("{}: {}", action, other),
    }
}

/// Run one command and return an OS exit code.
pub async fn run(cli: Cli) -> ExitCode {
    let config = client_config(&cli);
    log::debug!("Using backend {}", config.api_base_url);
    match execute(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command, config: ClientConfig) -> CliResult {
    let tokens = token_store(&config)?;
    let api = Arc::new(HttpApi::new(&config));

    if let Command::Chat { message, session } = command {
        return chat(api.as_ref(), &message, session).await;
    }
    if let Command::Logout = command {
        tokens.clear().map_err(|e| format!("Could not clear session: {}", e))?;
        println!("Signed out");
        return Ok(());
    }

    let mut editor = Editor::new(config, api, Box::new(tokens));
    match command {
        Command::Login { email, password } => {
            let user = editor.login(&email, &password).await.map_err(|e| api_error("Login failed", e))?;
            println!("Signed in as {} <{}>", user.username, user.email);
            Ok(())
        }
        Command::Register { username, email, password } => {
            let user = editor
                .register(&username, &email, &password)
                .await
                .map_err(|e| api_error("Registration failed", e))?;
            println!("Registered {} <{}>", user.username, user.email);
            Ok(())
        }
        command => {
            if !editor.restore_session().await {
                return Err("not signed in (run `pixelcrafter login`)".to_string());
            }
            signed_in(&mut editor, command).await
        }
    }
}

async fn signed_in(editor: &mut Editor<HttpApi>, command: Command) -> CliResult {
    match command {
        Command::Whoami => {
            if let Some(user) = editor.user() {
                println!("{} <{}> ({})", user.username, user.email, user.id);
            }
        }
        Command::Projects => {
            if editor.projects().is_empty() {
                println!("No projects yet");
            }
            for project in editor.projects() {
                println!("{}", project_line(project));
            }
        }
        Command::New { name, width, height, background } => {
            let mut request = NewProject::new(name).with_size(width, height);
            request.background_color = background;
            editor.create_project(request).await.map_err(|e| api_error("Could not create project", e))?;
            if let Some(project) = editor.current_project() {
                println!("{}", project_line(&project));
            }
        }
        Command::Delete { project } => {
            editor.delete_project(&project).await.map_err(|e| api_error("Could not delete project", e))?;
            println!("Deleted {}", project);
        }
        Command::Show { project } => {
            open(editor, &project).await?;
            show(editor);
        }
        Command::AddText { project, text, font_size, color, x, y } => {
            open(editor, &project).await?;
            let defaults = TextDefaults { text, font_size, color, position: Point::new(x, y), ..Default::default() };
            let id = editor.add_text_layer_with(&defaults).ok_or("Could not add text layer")?;
            save(editor).await?;
            println!("Added {}", id);
        }
        Command::AddShape { project, shape, fill } => {
            open(editor, &project).await?;
            let kind = ShapeKind::from(shape);
            let mut defaults = ShapeDefaults::for_kind(kind);
            if let Some(fill) = fill {
                defaults.fill = fill;
            }
            let id = editor.add_shape_layer_with(kind, &defaults).ok_or("Could not add shape layer")?;
            save(editor).await?;
            println!("Added {}", id);
        }
        Command::SetLayer { project, layer, name, visible, opacity } => {
            open(editor, &project).await?;
            let patch = LayerPatch { name, visible, opacity, ..Default::default() };
            if patch.is_empty() {
                return Err("nothing to change (pass --name, --visible or --opacity)".to_string());
            }
            let id = LayerId::from(layer);
            if !editor.update_layer(&id, &patch) {
                return Err(format!("No layer {} in project {}", id, project));
            }
            save(editor).await?;
            if let Some(layer) = editor.synchronizer().layer(&id) {
                println!("{}", layer_line(layer));
            }
        }
        Command::Upload { project, file } => {
            open(editor, &project).await?;
            let bytes = std::fs::read(&file).map_err(|e| format!("Could not read {}: {}", file.display(), e))?;
            let upload = ImageUpload {
                filename: file.file_name().map_or("image".into(), |n| n.to_string_lossy().into_owned()),
                content_type: content_type_for(&file).to_string(),
                bytes,
            };
            let layer = editor.upload_image(upload).await.map_err(|e| api_error("Upload failed", e))?;
            save(editor).await?;
            println!("{}", layer_line(&layer));
        }
        Command::Watch { project, seconds } => {
            open(editor, &project).await?;
            watch(editor, Duration::from_secs(seconds)).await;
        }
        Command::Login { .. } | Command::Register { .. } | Command::Logout | Command::Chat { .. } => {}
    }
    Ok(())
}

async fn open(editor: &mut Editor<HttpApi>, project: &str) -> CliResult {
    let report = editor
        .open_project_by_id(project)
        .await
        .map_err(|e| api_error("Could not open project", e))?;
    for (id, error) in &report.missing {
        eprintln!("warning: layer {} has no image: {}", id, error);
    }
    Ok(())
}

async fn save(editor: &mut Editor<HttpApi>) -> CliResult {
    let report = editor.flush_saves().await;
    log::info!("{}", flush_summary(&report));
    if report.is_clean() { Ok(()) } else { Err(flush_summary(&report)) }
}

fn show(editor: &Editor<HttpApi>) {
    if let Some(project) = editor.current_project() {
        println!("{}", project_line(&project));
        println!("background {}", project.background_color);
    }
    println!("\nLayers:");
    for layer in editor.layers() {
        println!("{}", layer_line(layer));
    }
    println!("\nObjects (paint order):");
    for (index, object) in editor.surface().objects().iter().enumerate() {
        println!("{}", object_line(index, object));
    }
}

async fn watch(editor: &mut Editor<HttpApi>, duration: Duration) {
    let deadline = Instant::now() + duration;
    println!("Watching for {}s (state: {:?})", duration.as_secs(), editor.channel_state());
    while Instant::now() < deadline {
        let applied = editor.sync_collaboration().await;
        if applied > 0 {
            println!("{} remote change{} applied; {} layers", applied, if applied == 1 { "" } else { "s" }, editor.layers().len());
        }
        for (user, tool) in editor.collaboration().remote_tools() {
            log::debug!("{} uses {}", user, tool.as_str());
        }
        for (user, cursor) in editor.collaboration().remote_cursors() {
            log::debug!("{} cursor at ({:.0}, {:.0})", user, cursor.x, cursor.y);
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    show(editor);
}

async fn chat(api: &HttpApi, message: &str, session: Option<String>) -> CliResult {
    let mut chat = match session {
        Some(id) => ChatSession::with_session_id(id),
        None => ChatSession::new(),
    };
    let reply = chat.send(api, message).await.ok_or("empty message")?;
    if reply.sender == ChatSender::Assistant {
        println!("{}", reply.text);
    }
    eprintln!("session {}", chat.session_id());
    Ok(())
}

/// Accepts `#rgb`, `#rrggbb` and `#rrggbbaa`.
fn parse_color(value: &str) -> Result<String, String> {
    if is_valid_color(value) {
        Ok(value.to_string())
    } else {
        Err(format!("`{}` is not a hex color", value))
    }
}
