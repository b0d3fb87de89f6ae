//! Error types for note storage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NoteError>;

#[derive(Error, Debug)]
pub enum NoteError {
    /// The identifier does not exist in the backend
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Transport, auth, or serialization failure talking to a backend
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl NoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NoteError::NotFound(_))
    }
}

impl From<serde_json::Error> for NoteError {
    fn from(e: serde_json::Error) -> Self {
        NoteError::Unavailable(format!("serialization: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_error_is_unavailable() {
        let err: NoteError = serde_json::from_str::<crate::Note>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, NoteError::Unavailable(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display() {
        let err = NoteError::NotFound("abc".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Note not found: abc");
    }
}
