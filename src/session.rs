//! Credentials, per-request context and the persisted bearer token.
//!
//! The token is read from a `TokenStore` once per logical session and then
//! carried explicitly inside a `RequestContext`. A logout that clears the
//! store cannot alter the token of a context that was already built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Key the token is stored under, kept from the browser client's
/// local-storage layout.
pub const TOKEN_KEY: &str = "authToken";

/// A bearer credential. `Debug` never prints the token itself.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            return Self::anonymous();
        }
        Self { token: Some(token) }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.token.is_some() { "Bearer <redacted>" } else { "anonymous" };
        f.debug_struct("Credentials").field("token", &shown).finish()
    }
}

/// Everything a gateway call needs besides its payload.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub credentials: Credentials,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cancel: CancellationToken::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Credentials::anonymous())
    }

    /// A narrower scope: cancelled when this context is, or on its own.
    pub fn child(&self) -> Self {
        Self {
            credentials: self.credentials.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Persistence for the single bearer token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn credentials(&self) -> Result<Credentials> {
        Ok(self.load()?.map(Credentials::bearer).unwrap_or_default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    #[serde(rename = "authToken")]
    auth_token: String,
}

/// Token persisted as `{"authToken": "<token>"}` in a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        let file: SessionFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file {}", self.path.display()))?;
        Ok(Some(file.auth_token).filter(|t| !t.is_empty()))
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let content = serde_json::to_string_pretty(&SessionFile {
            auth_token: token.to_string(),
        })?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "stored session token");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove session file {}", self.path.display())),
        }
    }
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self
            .token
            .lock()
            .map_err(|e| anyhow::anyhow!("Token store lock poisoned: {}", e))?;
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| anyhow::anyhow!("Token store lock poisoned: {}", e))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|e| anyhow::anyhow!("Token store lock poisoned: {}", e))?;
        *guard = None;
        Ok(())
    }
}
