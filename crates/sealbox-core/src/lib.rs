//! # sealbox-core
//!
//! Core types, traits, and abstractions for sealbox.
//!
//! This crate provides the vault data model, the storage traits the other
//! crates implement, configuration, logging field names and the shared
//! error type.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::SealboxConfig;
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use traits::*;
