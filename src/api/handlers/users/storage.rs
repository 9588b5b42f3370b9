//! Postgres-backed `UserStore`.

use anyhow::{anyhow, Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{InsertOutcome, NewUser, Role, User, UserStore};
use crate::api::{handlers::is_unique_violation, BoxFuture};

const USER_COLUMNS: &str =
    "id, email, name, avatar_url, bio, role::text AS role, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        avatar_url: row.get("avatar_url"),
        bio: row.get("bio"),
        role: role.parse::<Role>().map_err(|err| anyhow!(err))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

async fn fetch_one_by(pool: &PgPool, column: &str, bind: QueryKey<'_>) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let statement = sqlx::query(&query);
    let statement = match bind {
        QueryKey::Id(id) => statement.bind(id),
        QueryKey::Email(email) => statement.bind(email),
    };
    let row = statement
        .fetch_optional(pool)
        .instrument(span)
        .await
        .with_context(|| format!("failed to lookup user by {column}"))?;
    row.as_ref().map(user_from_row).transpose()
}

enum QueryKey<'a> {
    Id(Uuid),
    Email(&'a str),
}

impl UserStore for PgUserStore {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Option<User>> {
        Box::pin(fetch_one_by(&self.pool, "id", QueryKey::Id(id)))
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<User>> {
        Box::pin(fetch_one_by(&self.pool, "email", QueryKey::Email(email)))
    }

    fn insert<'a>(&'a self, user: &'a NewUser) -> BoxFuture<'a, InsertOutcome> {
        Box::pin(async move {
            let query = format!(
                r"
                INSERT INTO users (email, name, avatar_url, bio, role)
                VALUES ($1, $2, $3, $4, $5::user_role)
                RETURNING {USER_COLUMNS}
                "
            );
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = %query
            );
            let row = sqlx::query(&query)
                .bind(&user.email)
                .bind(&user.name)
                .bind(&user.avatar_url)
                .bind(&user.bio)
                .bind(user.role.as_str())
                .fetch_one(&self.pool)
                .instrument(span)
                .await;

            match row {
                Ok(row) => Ok(InsertOutcome::Created(user_from_row(&row)?)),
                Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
                Err(err) => Err(err).context("failed to insert user"),
            }
        })
    }

    fn owner_exists(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let query = "SELECT 1 FROM users WHERE role = 'owner' LIMIT 1";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            let row = sqlx::query(query)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to check for an owner")?;
            Ok(row.is_some())
        })
    }

    fn list(&self) -> BoxFuture<'_, Vec<User>> {
        Box::pin(async move {
            let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
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
                .context("failed to list users")?;
            rows.iter().map(user_from_row).collect()
        })
    }
}
