//! Infrastructure adapters for catalog sources.

pub mod catalog;

pub use catalog::{InMemoryEffectSource, JsonDirectorySource};
