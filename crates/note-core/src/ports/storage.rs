//! Storage trait for note persistence

use crate::Result;
use async_trait::async_trait;
use note_types::Note;

/// Note store
///
/// Every backend (memory, redis, object storage) offers the same observable
/// behavior for these operations; they differ only in medium and encoding.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Short label for logs and health output
    fn name(&self) -> &'static str;

    /// Fetch a note.
    ///
    /// Fails with `NoteError::NotFound` if the key is absent and
    /// `NoteError::Unavailable` if the store cannot be reached.
    async fn get(&self, key: &str) -> Result<Note>;

    /// Create or fully overwrite a note.
    async fn set(&self, key: &str, note: &Note) -> Result<()>;

    /// All stored identifiers, in no particular order.
    ///
    /// Remote backends walk their whole keyspace here; the cost grows with the
    /// number of stored notes.
    async fn keys(&self) -> Result<Vec<String>>;
}
