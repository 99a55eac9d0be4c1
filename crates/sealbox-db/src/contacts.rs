//! Contact repository.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use sealbox_core::{Error, Result};
use sealbox_crypto::StoredContact;

use crate::keys::{map_insert_error, parse_algorithm, parse_key_size};

const CONTACT_COLUMNS: &str = "id, label, algorithm, key_size, fingerprint, public_pem, \
     signing_fingerprint, signing_public_pem, imported_at, source";

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i64,
    label: String,
    algorithm: String,
    key_size: i64,
    fingerprint: String,
    public_pem: String,
    signing_fingerprint: Option<String>,
    signing_public_pem: Option<String>,
    imported_at: DateTime<Utc>,
    source: String,
}

impl TryFrom<ContactRow> for StoredContact {
    type Error = Error;

    fn try_from(row: ContactRow) -> Result<Self> {
        Ok(StoredContact {
            id: Some(row.id),
            label: row.label,
            algorithm: parse_algorithm(&row.algorithm)?,
            key_size: parse_key_size(row.key_size)?,
            fingerprint: row.fingerprint,
            public_pem: row.public_pem,
            signing_fingerprint: row.signing_fingerprint,
            signing_public_pem: row.signing_public_pem,
            imported_at: row.imported_at,
            source: row.source,
        })
    }
}

/// SQLite implementation of the contact repository.
#[derive(Clone)]
pub struct SqliteContactRepository {
    pool: SqlitePool,
}

impl SqliteContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a contact and return its id.
    pub async fn insert(&self, contact: &StoredContact) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO contacts (label, algorithm, key_size, fingerprint, public_pem,
                                  signing_fingerprint, signing_public_pem, imported_at, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.label)
        .bind(contact.algorithm.as_str())
        .bind(i64::from(contact.key_size))
        .bind(&contact.fingerprint)
        .bind(&contact.public_pem)
        .bind(&contact.signing_fingerprint)
        .bind(&contact.signing_public_pem)
        .bind(contact.imported_at)
        .bind(&contact.source)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Contact", &contact.fingerprint))?;

        let id = result.last_insert_rowid();
        debug!(
            subsystem = "database",
            component = "contacts",
            op = "insert",
            db_table = "contacts",
            id,
            fingerprint = %contact.fingerprint,
            "Contact stored"
        );
        Ok(id)
    }

    /// All contacts, oldest first.
    pub async fn list(&self) -> Result<Vec<StoredContact>> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {} FROM contacts ORDER BY id ASC",
            CONTACT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(StoredContact::try_from).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<StoredContact>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {} FROM contacts WHERE id = ?",
            CONTACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(StoredContact::try_from).transpose()
    }

    /// Get a contact by its encryption key fingerprint.
    pub async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<StoredContact>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {} FROM contacts WHERE fingerprint = ?",
            CONTACT_COLUMNS
        ))
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(StoredContact::try_from).transpose()
    }

    /// Contact whose signing key has `fingerprint`. Full scan.
    pub async fn find_by_signing_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredContact>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|c| c.signing_fingerprint.as_deref() == Some(fingerprint)))
    }

    /// Delete a contact. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
