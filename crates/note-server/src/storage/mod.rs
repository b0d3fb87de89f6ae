//! Storage layer
//!
//! Three interchangeable `NoteStore` backends plus the selector that picks one
//! of them from configuration on first use.

pub mod cache;
pub mod memory;
pub mod object;
pub mod selector;

pub use cache::RedisStore;
pub use memory::MemoryStore;
pub use object::ObjectNoteStore;
pub use selector::{BackendConfig, BackendSelector};
