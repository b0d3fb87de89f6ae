//! Note Core Library
//!
//! Backend contract and error taxonomy for the notes service.

// Re-export pure types from note-types
pub use note_types::*;

pub mod error;
pub mod ports;

pub use error::{NoteError, Result};
pub use ports::NoteStore;
