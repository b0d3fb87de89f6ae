//! Note types

use serde::{Deserialize, Serialize};

/// A stored text note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
}

impl Note {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Note create/update request
///
/// Used for both `POST /notes` and `PUT /notes/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

impl From<CreateNoteRequest> for Note {
    fn from(req: CreateNoteRequest) -> Self {
        Note {
            content: req.content,
        }
    }
}

/// Generate a fresh note identifier (random v4 UUID, hyphenated lowercase)
pub fn new_note_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
