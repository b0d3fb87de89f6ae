//! Note Types - Pure type definitions shared by the store and the HTTP layer
//!
//! This crate contains only data types and identifier generation, with no
//! async runtime dependencies.

pub mod note;

pub use note::*;
