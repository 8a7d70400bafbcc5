//! Catalog source backends.

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirectorySource;
pub use memory::InMemoryEffectSource;
