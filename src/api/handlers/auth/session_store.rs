//! Server-side refresh session records.
//!
//! One row per user holding the SHA-256 of the current refresh token. Writing a
//! new session overwrites the previous one, which is what makes refresh tokens
//! single-use and single-device.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::BoxFuture;

/// Key-value store of `user_id -> (refresh token digest, expiry)`.
pub trait SessionStore: Send + Sync {
    /// Replace the user's session with a new digest.
    fn put<'a>(
        &'a self,
        user_id: Uuid,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> BoxFuture<'a, ()>;

    /// Digest of the live session at `now`, if any.
    fn current(&self, user_id: Uuid, now: DateTime<Utc>) -> BoxFuture<'_, Option<Vec<u8>>>;

    /// Delete the user's session; returns whether one existed.
    fn remove(&self, user_id: Uuid) -> BoxFuture<'_, bool>;
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    fn put<'a>(
        &'a self,
        user_id: Uuid,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO refresh_sessions (user_id, token_hash, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id) DO UPDATE
                SET token_hash = EXCLUDED.token_hash,
                    expires_at = EXCLUDED.expires_at,
                    created_at = NOW()
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(user_id)
                .bind(token_hash)
                .bind(expires_at)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to store refresh session")?;
            Ok(())
        })
    }

    fn current(&self, user_id: Uuid, now: DateTime<Utc>) -> BoxFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move {
            let query = r"
                SELECT token_hash
                FROM refresh_sessions
                WHERE user_id = $1 AND expires_at > $2
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .bind(user_id)
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup refresh session")?;
            Ok(row.map(|row| row.get("token_hash")))
        })
    }

    fn remove(&self, user_id: Uuid) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let query = "DELETE FROM refresh_sessions WHERE user_id = $1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(user_id)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to delete refresh session")?;
            Ok(result.rows_affected() > 0)
        })
    }
}
