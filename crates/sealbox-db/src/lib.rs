//! # sealbox-db
//!
//! SQLite key store for sealbox.
//!
//! This crate provides:
//! - Connection pool management
//! - Identity and contact repositories
//! - [`KeyRing`], which seals identities before they reach the store
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealbox_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://keys.db").await?;
//!     for key in db.keys.list().await? {
//!         println!("{} {}", key.fingerprint, key.label);
//!     }
//!     Ok(())
//! }
//! ```
pub mod contacts;
pub mod keyring;
pub mod keys;
pub mod pool;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

pub use contacts::SqliteContactRepository;
pub use keyring::KeyRing;
pub use keys::SqliteKeyRepository;
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, PoolConfig, IN_MEMORY_URL,
};

// Re-export core types
pub use sealbox_core::*;

use sealbox_crypto::{StoredContact, StoredKeyPair};

/// Database handle holding the pool and all repositories.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    pub keys: SqliteKeyRepository,
    pub contacts: SqliteContactRepository,
}

impl Database {
    /// Wrap an existing pool. The schema is not touched.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            keys: SqliteKeyRepository::new(pool.clone()),
            contacts: SqliteContactRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` and bring the schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        let db = Self::new(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Connect with custom pool configuration and bring the schema up to date.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        let db = Self::new(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database, migrated.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(IN_MEMORY_URL).await
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "database",
            component = "schema",
            op = "migrate",
            "Key store schema ready"
        );
        log_pool_metrics(&self.pool);
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl KeyStore for Database {
    async fn insert_key(&self, key: &StoredKeyPair) -> Result<i64> {
        self.keys.insert(key).await
    }

    async fn list_keys(&self) -> Result<Vec<StoredKeyPair>> {
        self.keys.list().await
    }

    async fn get_key(&self, id: i64) -> Result<Option<StoredKeyPair>> {
        self.keys.get(id).await
    }

    async fn delete_key(&self, id: i64) -> Result<bool> {
        self.keys.delete(id).await
    }

    async fn insert_contact(&self, contact: &StoredContact) -> Result<i64> {
        self.contacts.insert(contact).await
    }

    async fn list_contacts(&self) -> Result<Vec<StoredContact>> {
        self.contacts.list().await
    }

    async fn get_contact(&self, id: i64) -> Result<Option<StoredContact>> {
        self.contacts.get(id).await
    }

    async fn delete_contact(&self, id: i64) -> Result<bool> {
        self.contacts.delete(id).await
    }

    async fn find_contact_by_signing_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredContact>> {
        self.contacts.find_by_signing_fingerprint(fingerprint).await
    }
}
