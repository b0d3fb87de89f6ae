//! In-memory note store
//!
//! Process-local only; everything is lost on restart.

use async_trait::async_trait;
use note_core::{Note, NoteError, NoteStore, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct MemoryStore {
    data: RwLock<HashMap<String, Note>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Note> {
        self.data
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| NoteError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, note: &Note) -> Result<()> {
        self.data.write().await.insert(key.to_string(), note.clone());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        // Copied under the read lock so concurrent writers can't skew the snapshot
        Ok(self.data.read().await.keys().cloned().collect())
    }
}
