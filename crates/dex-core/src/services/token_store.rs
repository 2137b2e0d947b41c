//! Data source token storage
//!
//! Persists the tokens a user obtained by linking a data source through
//! the OAuth flow. The adapter and service never touch this; the host
//! stores what `DataProviderService::get_tokens` returned and reads it back
//! for authenticated calls.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::models::{LinkedDataSource, OauthTokens};

/// Database row of the `data_source_users` table
#[derive(Debug, Clone, FromRow)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    scope: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<StoredTokens> for OauthTokens {
    fn from(row: StoredTokens) -> Self {
        OauthTokens {
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            token_type: row.token_type,
            scope: row.scope,
            expires_at: row.expires_at,
        }
    }
}

/// SQLite-backed store of linked data source tokens
pub struct DataSourceTokenStore {
    pool: SqlitePool,
}

impl DataSourceTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save (or replace) the tokens of `user_id` for a data source
    pub async fn save_tokens(
        &self,
        user_id: &str,
        data_source_guid: &str,
        tokens: &OauthTokens,
    ) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO data_source_users
                (id, user_id, data_source_guid, access_token, refresh_token, token_type,
                 scope, expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, data_source_guid) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_type = excluded.token_type,
                scope = excluded.scope,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(data_source_guid)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(&tokens.token_type)
        .bind(&tokens.scope)
        .bind(tokens.expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        log::info!(
            "[token_store] Saved tokens of user {} for data source {}",
            user_id,
            data_source_guid
        );
        Ok(())
    }

    /// Tokens of `user_id` for a data source, if linked
    pub async fn get_tokens(&self, user_id: &str, data_source_guid: &str) -> Result<Option<OauthTokens>> {
        let row: Option<StoredTokens> = sqlx::query_as(
            r#"
            SELECT access_token, refresh_token, token_type, scope, expires_at
            FROM data_source_users
            WHERE user_id = ? AND data_source_guid = ?
            "#,
        )
        .bind(user_id)
        .bind(data_source_guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OauthTokens::from))
    }

    /// Unlink a data source; returns whether anything was removed
    pub async fn remove_tokens(&self, user_id: &str, data_source_guid: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM data_source_users WHERE user_id = ? AND data_source_guid = ?",
        )
        .bind(user_id)
        .bind(data_source_guid)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            log::info!(
                "[token_store] Removed tokens of user {} for data source {}",
                user_id,
                data_source_guid
            );
        }
        Ok(removed)
    }

    /// Data sources `user_id` has linked, without token values
    pub async fn list_linked_sources(&self, user_id: &str) -> Result<Vec<LinkedDataSource>> {
        let rows: Vec<LinkedDataSource> = sqlx::query_as(
            r#"
            SELECT user_id, data_source_guid, token_type, scope, expires_at, updated_at
            FROM data_source_users
            WHERE user_id = ?
            ORDER BY data_source_guid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
