//! Storage abstraction and implementations for SkillMatrix.
//!
//! This crate provides the trait-based seam to the hosted record store,
//! with an in-memory and a JSON-file reference implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;

pub use trait_::{Storage, StorageError, Result, ChangeSet};
pub use memory::MemoryStorage;
pub use json_storage::JsonStorage;
