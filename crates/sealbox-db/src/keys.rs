//! Identity key repository.
//!
//! Rows hold public material as PEM and private material only as sealed
//! blobs produced by `KeyManager::seal`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use sealbox_core::{Error, Result};
use sealbox_crypto::{EncryptionAlgorithm, StoredKeyPair};

const KEY_COLUMNS: &str = "id, label, created_at, algorithm, key_size, fingerprint, public_pem, \
     sealed_private_key, signing_fingerprint, signing_public_pem, sealed_signing_key";

#[derive(Debug, sqlx::FromRow)]
struct KeyRow {
    id: i64,
    label: String,
    created_at: DateTime<Utc>,
    algorithm: String,
    key_size: i64,
    fingerprint: String,
    public_pem: String,
    sealed_private_key: Vec<u8>,
    signing_fingerprint: Option<String>,
    signing_public_pem: Option<String>,
    sealed_signing_key: Option<Vec<u8>>,
}

impl TryFrom<KeyRow> for StoredKeyPair {
    type Error = Error;

    fn try_from(row: KeyRow) -> Result<Self> {
        Ok(StoredKeyPair {
            id: Some(row.id),
            label: row.label,
            created_at: row.created_at,
            algorithm: parse_algorithm(&row.algorithm)?,
            key_size: parse_key_size(row.key_size)?,
            fingerprint: row.fingerprint,
            public_pem: row.public_pem,
            sealed_private_key: row.sealed_private_key,
            signing_fingerprint: row.signing_fingerprint,
            signing_public_pem: row.signing_public_pem,
            sealed_signing_key: row.sealed_signing_key,
        })
    }
}

pub(crate) fn parse_algorithm(value: &str) -> Result<EncryptionAlgorithm> {
    value
        .parse()
        .map_err(|_| Error::Storage(format!("Unknown algorithm '{}' in key store", value)))
}

pub(crate) fn parse_key_size(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Storage(format!("Invalid key size {} in key store", value)))
}

/// Map a uniqueness violation to a duplicate-record error.
pub(crate) fn map_insert_error(e: sqlx::Error, what: &str, fingerprint: &str) -> Error {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return Error::InvalidInput(format!(
                "{} with fingerprint {} already exists",
                what, fingerprint
            ));
        }
    }
    Error::Database(e)
}

/// SQLite implementation of the identity key repository.
#[derive(Clone)]
pub struct SqliteKeyRepository {
    pool: SqlitePool,
}

impl SqliteKeyRepository {
    /// Create a new SqliteKeyRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an identity and return its id.
    ///
    /// An identity whose fingerprint is already stored is rejected with
    /// `InvalidInput`.
    pub async fn insert(&self, key: &StoredKeyPair) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO keys (label, created_at, algorithm, key_size, fingerprint, public_pem,
                              sealed_private_key, signing_fingerprint, signing_public_pem,
                              sealed_signing_key)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key.label)
        .bind(key.created_at)
        .bind(key.algorithm.as_str())
        .bind(i64::from(key.key_size))
        .bind(&key.fingerprint)
        .bind(&key.public_pem)
        .bind(&key.sealed_private_key)
        .bind(&key.signing_fingerprint)
        .bind(&key.signing_public_pem)
        .bind(&key.sealed_signing_key)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Identity", &key.fingerprint))?;

        let id = result.last_insert_rowid();
        debug!(
            subsystem = "database",
            component = "keys",
            op = "insert",
            db_table = "keys",
            id,
            fingerprint = %key.fingerprint,
            "Identity stored"
        );
        Ok(id)
    }

    /// All identities, oldest first.
    pub async fn list(&self) -> Result<Vec<StoredKeyPair>> {
        let rows = sqlx::query_as::<_, KeyRow>(&format!(
            "SELECT {} FROM keys ORDER BY id ASC",
            KEY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(StoredKeyPair::try_from).collect()
    }

    /// Get an identity by id.
    pub async fn get(&self, id: i64) -> Result<Option<StoredKeyPair>> {
        let row = sqlx::query_as::<_, KeyRow>(&format!(
            "SELECT {} FROM keys WHERE id = ?",
            KEY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(StoredKeyPair::try_from).transpose()
    }

    /// Delete an identity. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
