//! Common types and utilities shared across Siphon components

pub mod logging;
pub mod types;

pub use types::{CollectionTask, RemoteObject};
