//! SQLite-backed [`TokenStore`] with tokens sealed at rest.

use super::{Credential, Sealed, TokenCipher, TokenStore};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE fitbit_user_access_tokens (
///     user_id TEXT PRIMARY KEY,
///     access_token TEXT NOT NULL,        -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     refresh_token TEXT NOT NULL,       -- Encrypted
///     refresh_token_nonce TEXT NOT NULL,
///     expires_at TEXT NOT NULL,          -- RFC 3339
///     provider_subject_id TEXT NOT NULL,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// Every write is a single `INSERT .. ON CONFLICT DO UPDATE`, so a refresh
/// replaces the token pair, expiry and subject id in one statement.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl CredentialStore {
    /// Creates or opens a store.
    ///
    /// # Arguments
    /// * `db_path` - SQLite database file, or `:memory:`
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS fitbit_user_access_tokens (
                user_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                refresh_token_nonce TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                provider_subject_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create fitbit_user_access_tokens table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential store connection lock poisoned"))
    }
}

impl TokenStore for CredentialStore {
    fn load(&self, user_id: &str) -> Result<Option<Credential>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce,
                       expires_at, provider_subject_id
                FROM fitbit_user_access_tokens
                WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        Sealed {
                            ciphertext: row.get(0)?,
                            nonce: row.get(1)?,
                        },
                        Sealed {
                            ciphertext: row.get(2)?,
                            nonce: row.get(3)?,
                        },
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query credential")?;

        let Some((access, refresh, expires_at, provider_subject_id)) = row else {
            return Ok(None);
        };

        let access_token = self
            .cipher
            .open(&access)
            .context("Failed to decrypt access token")?;
        let refresh_token = self
            .cipher
            .open(&refresh)
            .context("Failed to decrypt refresh token")?;
        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .context("Failed to parse expires_at timestamp")?;

        Ok(Some(Credential {
            access_token,
            refresh_token,
            expires_at,
            provider_subject_id,
        }))
    }

    fn save(&self, user_id: &str, credential: &Credential) -> Result<()> {
        let access = self
            .cipher
            .seal(&credential.access_token)
            .context("Failed to encrypt access token")?;
        let refresh = self
            .cipher
            .seal(&credential.refresh_token)
            .context("Failed to encrypt refresh token")?;
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO fitbit_user_access_tokens (
                    user_id,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    expires_at, provider_subject_id,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT(user_id) DO UPDATE SET
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    expires_at = excluded.expires_at,
                    provider_subject_id = excluded.provider_subject_id,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    access.ciphertext,
                    access.nonce,
                    refresh.ciphertext,
                    refresh.nonce,
                    credential.expires_at.to_rfc3339(),
                    credential.provider_subject_id,
                    now,
                ],
            )
            .context("Failed to store credential")?;

        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<bool> {
        let rows_affected = self
            .conn()?
            .execute(
                "DELETE FROM fitbit_user_access_tokens WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete credential")?;

        Ok(rows_affected > 0)
    }

    fn list_users(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT user_id FROM fitbit_user_access_tokens ORDER BY user_id")
            .context("Failed to prepare query")?;

        let users = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to execute query")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read results")?;

        Ok(users)
    }
}
