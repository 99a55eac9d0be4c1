//! # sealbox-vault
//!
//! Zero-knowledge file vault.
//!
//! The remote store sees GUIDs, folder linkage and ciphertext. Names and
//! sizes live only in the encrypted index, and file contents only in
//! hybrid-encrypted blobs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sealbox_crypto::SoftwareProvider;
//! use sealbox_vault::{MemoryRemoteStore, VaultService};
//!
//! let vault = VaultService::new(SoftwareProvider::shared(), Arc::new(MemoryRemoteStore::new()));
//! vault.set_identity(identity).await;
//! vault.open_or_create().await?;
//! let guid = vault.upload_file(None, "notes.txt", b"hello world", Some("text/plain")).await?;
//! assert_eq!(vault.download_file(&guid).await?, b"hello world");
//! ```

pub mod filesystem;
pub mod memory;
pub mod service;

pub use filesystem::FilesystemRemoteStore;
pub use memory::MemoryRemoteStore;
pub use service::VaultService;
