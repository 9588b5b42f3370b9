use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

use crate::GIT_COMMIT_HASH;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database is healthy", body = [Health]),
        (status = 503, description = "Database is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    let result = match pool.0.acquire().instrument(acquire_span).await {
        Ok(mut conn) => {
            let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
            match conn.ping().instrument(ping_span).await {
                Ok(()) => Ok(()),
                Err(error) => {
                    error!("Failed to ping database: {}", error);

                    Err(StatusCode::SERVICE_UNAVAILABLE)
                }
            }
        }

        Err(error) => {
            error!("Failed to acquire database connection: {}", error);

            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = x_app_headers(&health);

    if result.is_ok() {
        debug!("Database connection is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Database connection is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

/// `X-App: name:version:short-commit`, or no header if it cannot be encoded.
fn x_app_headers(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(0..7).unwrap_or("");
    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_app_header_uses_short_commit() {
        let health = Health {
            commit: "0123456789abcdef".to_string(),
            name: "quillkeep".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };
        let headers = x_app_headers(&health);
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("quillkeep:0.1.0:0123456")
        );
    }

    #[test]
    fn x_app_header_tolerates_unknown_commit() {
        let health = Health {
            commit: "unknown".to_string(),
            name: "quillkeep".to_string(),
            version: "0.1.0".to_string(),
            database: "error".to_string(),
        };
        let headers = x_app_headers(&health);
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("quillkeep:0.1.0:")
        );
    }
}
