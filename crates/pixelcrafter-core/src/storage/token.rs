//! Persistence of the session token across restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Token store errors.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Could not determine a data directory")]
    NoDataDir,
}

/// Result type for token store operations.
pub type TokenStoreResult<T> = Result<T, TokenStoreError>;

/// Where the bearer token lives between sessions.
pub trait TokenStore: Send + Sync {
    /// The stored token, if any.
    fn load(&self) -> TokenStoreResult<Option<String>>;

    /// Store a token, replacing any previous one.
    fn save(&self, token: &str) -> TokenStoreResult<()>;

    /// Forget the token.
    fn clear(&self) -> TokenStoreResult<()>;
}

/// Token kept in a single file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Token file in the default location.
    ///
    /// On Unix: `~/.local/share/pixelcrafter/token`
    /// On Windows: `%LOCALAPPDATA%\pixelcrafter\token`
    pub fn default_location() -> TokenStoreResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or(TokenStoreError::NoDataDir)?;
        Ok(Self::new(base.join("pixelcrafter").join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> TokenStoreResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&self.path).map_err(|e| {
            TokenStoreError::Io(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    fn save(&self, token: &str) -> TokenStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TokenStoreError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(&self.path, token).map_err(|e| {
            TokenStoreError::Io(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    fn clear(&self) -> TokenStoreResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                TokenStoreError::Io(format!("Failed to delete {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Token kept only for the life of the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> TokenStoreResult<Option<String>> {
        let token = self
            .token
            .read()
            .map_err(|e| TokenStoreError::Io(format!("Lock error: {}", e)))?;
        Ok(token.clone())
    }

    fn save(&self, token: &str) -> TokenStoreResult<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|e| TokenStoreError::Io(format!("Lock error: {}", e)))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> TokenStoreResult<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|e| TokenStoreError::Io(format!("Lock error: {}", e)))?;
        *slot = None;
        Ok(())
    }
}
