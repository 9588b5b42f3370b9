//! Sign-up request storage.
//!
//! Status changes are conditional updates (`WHERE status = $from`), so two
//! concurrent writers on the same row are serialized by the database and
//! exactly one of them sees the row come back.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{NewSignupRequest, SignupRequest, SignupStatus};
use crate::api::{handlers::is_unique_violation, BoxFuture};

#[derive(Debug)]
pub enum SignupInsert {
    Created(SignupRequest),
    /// Another active request for the email won a concurrent insert.
    Duplicate,
}

pub trait SignupStore: Send + Sync {
    /// Most recent request for the email, any status.
    fn latest_for_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<SignupRequest>>;

    fn find(&self, id: Uuid) -> BoxFuture<'_, Option<SignupRequest>>;

    fn insert<'a>(&'a self, request: &'a NewSignupRequest) -> BoxFuture<'a, SignupInsert>;

    /// Move `id` from `from` to `to`. With `live_at`, the row must also be
    /// unexpired at that instant. Returns the updated row, or `None` when the
    /// condition did not hold.
    fn transition(
        &self,
        id: Uuid,
        from: SignupStatus,
        to: SignupStatus,
        live_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Option<SignupRequest>>;

    /// Expire every pending/accepted/rejected row past its deadline.
    fn expire_stale(&self, now: DateTime<Utc>) -> BoxFuture<'_, u64>;

    /// Newest request per distinct email, newest first.
    fn latest_per_email(&self) -> BoxFuture<'_, Vec<SignupRequest>>;
}

const REQUEST_COLUMNS: &str =
    "id, email, name, status::text AS status, expires_at, created_at, updated_at";

fn request_from_row(row: &PgRow) -> Result<SignupRequest> {
    let status: String = row.get("status");
    Ok(SignupRequest {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        status: status.parse::<SignupStatus>().map_err(|err| anyhow!(err))?,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[derive(Clone, Debug)]
pub struct PgSignupStore {
    pool: PgPool,
}

impl PgSignupStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SignupStore for PgSignupStore {
    fn latest_for_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<SignupRequest>> {
        Box::pin(async move {
            let query = format!(
                r"
                SELECT {REQUEST_COLUMNS}
                FROM signup_requests
                WHERE email = $1
                ORDER BY created_at DESC
                LIMIT 1
                "
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = %query
            );
            let row = sqlx::query(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup latest sign-up request")?;
            row.as_ref().map(request_from_row).transpose()
        })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'_, Option<SignupRequest>> {
        Box::pin(async move {
            let query = format!("SELECT {REQUEST_COLUMNS} FROM signup_requests WHERE id = $1");
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = %query
            );
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup sign-up request")?;
            row.as_ref().map(request_from_row).transpose()
        })
    }

    fn insert<'a>(&'a self, request: &'a NewSignupRequest) -> BoxFuture<'a, SignupInsert> {
        Box::pin(async move {
            let query = format!(
                r"
                INSERT INTO signup_requests (email, name, status, expires_at, created_at, updated_at)
                VALUES ($1, $2, 'pending', $3, $4, $4)
                RETURNING {REQUEST_COLUMNS}
                "
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = %query
            );
            let row = sqlx::query(&query)
                .bind(&request.email)
                .bind(&request.name)
                .bind(request.expires_at)
                .bind(request.created_at)
                .fetch_one(&self.pool)
                .instrument(span)
                .await;

            match row {
                Ok(row) => Ok(SignupInsert::Created(request_from_row(&row)?)),
                Err(err) if is_unique_violation(&err) => Ok(SignupInsert::Duplicate),
                Err(err) => Err(err).context("failed to insert sign-up request"),
            }
        })
    }

    fn transition(
        &self,
        id: Uuid,
        from: SignupStatus,
        to: SignupStatus,
        live_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Option<SignupRequest>> {
        Box::pin(async move {
            let query = format!(
                r"
                UPDATE signup_requests
                SET status = $3::signup_status, updated_at = $5
                WHERE id = $1
                  AND status = $2::signup_status
                  AND ($4::timestamptz IS NULL OR expires_at > $4)
                RETURNING {REQUEST_COLUMNS}
                "
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = %query
            );
            let row = sqlx::query(&query)
                .bind(id)
                .bind(from.as_str())
                .bind(to.as_str())
                .bind(live_at)
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .with_context(|| format!("failed to move sign-up request {from} -> {to}"))?;
            row.as_ref().map(request_from_row).transpose()
        })
    }

    fn expire_stale(&self, now: DateTime<Utc>) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let query = r"
                UPDATE signup_requests
                SET status = 'expired', updated_at = $1
                WHERE expires_at < $1
                  AND status IN ('pending', 'accepted', 'rejected')
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            let result = sqlx::query(query)
                .bind(now)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to expire stale sign-up requests")?;
            Ok(result.rows_affected())
        })
    }

    fn latest_per_email(&self) -> BoxFuture<'_, Vec<SignupRequest>> {
        Box::pin(async move {
            let query = format!(
                r"
                SELECT * FROM (
                    SELECT DISTINCT ON (email) {REQUEST_COLUMNS}
                    FROM signup_requests
                    ORDER BY email, created_at DESC
                ) latest
                ORDER BY created_at DESC
                "
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = %query
            );
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .instrument(span)
                .await
                .context("failed to list sign-up requests")?;
            rows.iter().map(request_from_row).collect()
        })
    }
}
