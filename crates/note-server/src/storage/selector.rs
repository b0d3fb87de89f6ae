//! Backend selection
//!
//! The selector owns the backend configuration and builds the configured
//! `NoteStore` the first time a request asks for it. Every later call gets the
//! same instance.

use super::{MemoryStore, ObjectNoteStore, RedisStore};
use note_core::{NoteError, NoteStore, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Redis,
    Gcs,
}

impl BackendKind {
    /// Parse a `BACKEND` value; anything unrecognized or absent means memory
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return BackendKind::Memory;
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => BackendKind::Memory,
            "redis" | "cache" => BackendKind::Redis,
            "gcs" | "objectstore" => BackendKind::Gcs,
            other => {
                warn!("Unknown backend {:?}, falling back to memory", other);
                BackendKind::Memory
            }
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Redis => write!(f, "redis"),
            BackendKind::Gcs => write!(f, "gcs"),
        }
    }
}

/// Everything needed to build any of the backends
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Raw `BACKEND` value, resolved on first access
    pub backend: Option<String>,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub redis_ttl_secs: Option<u64>,
    pub gcs_bucket: Option<String>,
    pub gcs_prefix: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: None,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            redis_key_prefix: "notes:".to_string(),
            redis_ttl_secs: None,
            gcs_bucket: None,
            gcs_prefix: "notes".to_string(),
        }
    }
}

pub struct BackendSelector {
    config: BackendConfig,
    backend: OnceCell<Arc<dyn NoteStore>>,
}

impl BackendSelector {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
        }
    }

    /// The shared backend, built on first call.
    ///
    /// Concurrent first callers wait on the same initialization. A failed build
    /// leaves the cell empty so a later request can try again.
    pub async fn backend(&self) -> Result<Arc<dyn NoteStore>> {
        self.backend
            .get_or_try_init(|| self.build())
            .await
            .map(Arc::clone)
    }

    /// Label of the backend if one has been built yet
    pub fn active(&self) -> Option<&'static str> {
        self.backend.get().map(|store| store.name())
    }

    async fn build(&self) -> Result<Arc<dyn NoteStore>> {
        let kind = BackendKind::parse(self.config.backend.as_deref());
        info!("Initializing backend: {}", kind);

        let store: Arc<dyn NoteStore> = match kind {
            BackendKind::Memory => Arc::new(MemoryStore::new()),
            BackendKind::Redis => Arc::new(
                RedisStore::connect(
                    &self.config.redis_url,
                    &self.config.redis_key_prefix,
                    self.config.redis_ttl_secs,
                )
                .await?,
            ),
            BackendKind::Gcs => {
                let bucket = self.config.gcs_bucket.as_deref().ok_or_else(|| {
                    NoteError::Unavailable("GCS_BUCKET is not set".to_string())
                })?;
                Arc::new(ObjectNoteStore::gcs(bucket, &self.config.gcs_prefix)?)
            }
        };

        info!("Backend {} ready", store.name());
        Ok(store)
    }
}
