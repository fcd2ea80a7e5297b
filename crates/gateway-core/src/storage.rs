//! SQLite credential store
//!
//! Persists user-supplied provider keys, encrypted with the process
//! [`CredentialCipher`]. Plaintext never reaches the database and is never
//! returned from listing operations.

use crate::credentials::{CallerIdentity, CredentialStore};
use crate::crypto::CredentialCipher;
use crate::llm::ProviderId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Stored credential record (envelope only)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredCredential {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    #[serde(skip_serializing)]
    pub key_encrypted: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Credential store backed by SQLite
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
    cipher: Arc<CredentialCipher>,
}

impl SqliteCredentialStore {
    /// Connect to the given database URL and run migrations
    pub async fn new(database_url: &str, cipher: Arc<CredentialCipher>) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool, cipher };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store
    pub async fn in_memory(cipher: Arc<CredentialCipher>) -> StorageResult<Self> {
        // Every sqlite::memory: connection is its own database, so pin one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool, cipher };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                key_encrypted TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_api_keys_user_provider ON api_keys(user_id, provider_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Encrypt and store a credential for a caller
    pub async fn create_credential(
        &self,
        caller: &CallerIdentity,
        provider: ProviderId,
        secret: &str,
    ) -> StorageResult<StoredCredential> {
        let record = StoredCredential {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: caller.as_str().to_string(),
            provider_id: provider.as_str().to_string(),
            key_encrypted: self.cipher.encrypt(secret),
            enabled: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO api_keys (id, user_id, provider_id, key_encrypted, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.provider_id)
        .bind(&record.key_encrypted)
        .bind(record.enabled)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// List a caller's credentials
    pub async fn list_credentials(
        &self,
        caller: &CallerIdentity,
    ) -> StorageResult<Vec<StoredCredential>> {
        let records = sqlx::query_as::<_, StoredCredential>(
            r#"
            SELECT id, user_id, provider_id, key_encrypted, enabled, created_at
            FROM api_keys
            WHERE user_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(caller.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Get a credential record by ID
    pub async fn get_credential(&self, id: &str) -> StorageResult<StoredCredential> {
        sqlx::query_as::<_, StoredCredential>(
            r#"
            SELECT id, user_id, provider_id, key_encrypted, enabled, created_at
            FROM api_keys
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("Credential {id}")))
    }

    /// Toggle enabled status, returning the new state
    pub async fn toggle_credential(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE api_keys SET enabled = NOT enabled WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Credential {id}")));
        }

        let record = self.get_credential(id).await?;
        Ok(record.enabled)
    }

    /// Delete a credential
    pub async fn delete_credential(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("Credential {id}")));
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_enabled_credential(
        &self,
        caller: &CallerIdentity,
        provider: ProviderId,
    ) -> Result<Option<String>, StorageError> {
        let envelope = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key_encrypted
            FROM api_keys
            WHERE user_id = ? AND provider_id = ? AND enabled = 1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(caller.as_str())
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(envelope)
    }
}
