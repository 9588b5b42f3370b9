//! Token authority: signed access/refresh tokens plus rotation and revocation.
//!
//! Flow Overview:
//! 1) `issue` signs an access token (3h) and a refresh token (7d) with HS256 and
//!    overwrites the user's session record with the refresh token digest.
//! 2) `verify_access` is stateless: signature, expiry and `typ = access`.
//! 3) `rotate` accepts a refresh token only if its digest equals the stored one,
//!    reloads the user (role may have changed) and issues a fresh pair.
//! 4) `revoke` deletes the session record, so no refresh token works afterwards.
//!
//! Security boundary: every rejection reaches the caller as `Unauthenticated`;
//! the concrete reason is only logged at debug level.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tracing::debug;
use uuid::Uuid;

use super::{session_store::SessionStore, state::AuthConfig, utils::hash_refresh_token};
use crate::api::{
    deadline,
    error::{ApiError, ApiResult},
    handlers::users::{Role, User, UserStore},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

/// Access + refresh pair returned by `issue` and `rotate`.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Why a token was refused. Never leaves this module except through debug logs.
#[derive(Debug)]
enum TokenError {
    Malformed(jsonwebtoken::errors::Error),
    Expired,
    WrongKind(TokenKind),
    NotCurrent,
    UnknownUser,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed or forged token: {err}"),
            Self::Expired => f.write_str("token expired"),
            Self::WrongKind(kind) => write!(f, "unexpected token kind: {kind:?}"),
            Self::NotCurrent => f.write_str("refresh token revoked or superseded"),
            Self::UnknownUser => f.write_str("token subject no longer exists"),
        }
    }
}

fn deny(reason: &TokenError) -> ApiError {
    debug!(reason = %reason, "token rejected");
    ApiError::Unauthenticated
}

pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    io_timeout: Duration,
}

impl TokenAuthority {
    #[must_use]
    pub fn new(
        secret: &SecretString,
        config: &AuthConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller-supplied clock in `decode_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            sessions,
            users,
            access_ttl_seconds: config.access_ttl_seconds(),
            refresh_ttl_seconds: config.refresh_ttl_seconds(),
            io_timeout: config.io_timeout(),
        }
    }

    /// Issue a token pair for `user` and make its refresh token the only live one.
    ///
    /// # Errors
    /// `Internal` if signing fails or the session store cannot be written.
    pub async fn issue(&self, user: &User) -> ApiResult<TokenPair> {
        self.issue_at(user, Utc::now()).await
    }

    pub(crate) async fn issue_at(&self, user: &User, now: DateTime<Utc>) -> ApiResult<TokenPair> {
        let (access_token, access_expires_at) =
            self.sign(user, TokenKind::Access, now, self.access_ttl_seconds)?;
        let (refresh_token, refresh_expires_at) =
            self.sign(user, TokenKind::Refresh, now, self.refresh_ttl_seconds)?;

        let digest = hash_refresh_token(&refresh_token);
        deadline::within(
            self.io_timeout,
            "session write",
            self.sessions.put(user.id, &digest, refresh_expires_at),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            access_expires_at,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Stateless access-token check.
    ///
    /// # Errors
    /// `Unauthenticated` for any malformed, forged, expired or non-access token.
    pub fn verify_access(&self, token: &str) -> ApiResult<Claims> {
        self.verify_access_at(token, Utc::now())
    }

    pub(crate) fn verify_access_at(&self, token: &str, now: DateTime<Utc>) -> ApiResult<Claims> {
        self.decode_at(token, TokenKind::Access, now)
            .map_err(|reason| deny(&reason))
    }

    /// Exchange the current refresh token for a new pair.
    ///
    /// # Errors
    /// `Unauthenticated` if the token is invalid, expired, revoked, superseded or
    /// its user is gone; `Internal` on storage failures.
    pub async fn rotate(&self, presented: &str) -> ApiResult<(TokenPair, User)> {
        self.rotate_at(presented, Utc::now()).await
    }

    pub(crate) async fn rotate_at(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<(TokenPair, User)> {
        let claims = self
            .decode_at(presented, TokenKind::Refresh, now)
            .map_err(|reason| deny(&reason))?;

        let stored = deadline::within(
            self.io_timeout,
            "session lookup",
            self.sessions.current(claims.id, now),
        )
        .await?;
        if stored.as_deref() != Some(hash_refresh_token(presented).as_slice()) {
            return Err(deny(&TokenError::NotCurrent));
        }

        let user = deadline::within(
            self.io_timeout,
            "user lookup",
            self.users.find_by_id(claims.id),
        )
        .await?
        .ok_or_else(|| deny(&TokenError::UnknownUser))?;

        let pair = self.issue_at(&user, now).await?;
        Ok((pair, user))
    }

    /// Delete the user's session; later `rotate` calls for them fail.
    ///
    /// # Errors
    /// `Internal` if the session store cannot be reached.
    pub async fn revoke(&self, user_id: Uuid) -> ApiResult<()> {
        let removed = deadline::within(
            self.io_timeout,
            "session delete",
            self.sessions.remove(user_id),
        )
        .await?;
        if !removed {
            debug!(user_id = %user_id, "revoke: no live session");
        }
        Ok(())
    }

    fn sign(
        &self,
        user: &User,
        typ: TokenKind,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> ApiResult<(String, DateTime<Utc>)> {
        let expires_at = now + ChronoDuration::seconds(ttl_seconds);
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            typ,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to sign token: {err}")))?;
        Ok((token, expires_at))
    }

    fn decode_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Malformed)?
            .claims;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.typ != expected {
            return Err(TokenError::WrongKind(claims.typ));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemorySessionStore, MemoryUserStore};
    use anyhow::{anyhow, Result};

    struct Fixture {
        authority: TokenAuthority,
        sessions: Arc<MemorySessionStore>,
        users: Arc<MemoryUserStore>,
    }

    fn fixture_with_secret(secret: &str) -> Fixture {
        fixture_with(
            secret,
            &AuthConfig::new("https://quillkeep.dev".to_string()),
        )
    }

    fn fixture_with(secret: &str, config: &AuthConfig) -> Fixture {
        let sessions = Arc::new(MemorySessionStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let authority = TokenAuthority::new(
            &SecretString::from(secret.to_string()),
            config,
            sessions.clone(),
            users.clone(),
        );
        Fixture {
            authority,
            sessions,
            users,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_secret("test-signing-secret")
    }

    fn ok<T>(result: ApiResult<T>) -> Result<T> {
        result.map_err(|err| anyhow!("{err}"))
    }

    #[tokio::test]
    async fn issue_stores_single_session() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;

        let pair = ok(f.authority.issue(&user).await)?;
        assert_eq!(f.sessions.len().await, 1);

        let claims = ok(f.authority.verify_access(&pair.access_token))?;
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.exp - claims.iat, 3 * 60 * 60);

        ok(f.authority.issue(&user).await)?;
        assert_eq!(f.sessions.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn only_latest_refresh_token_rotates() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;

        let first = ok(f.authority.issue(&user).await)?;
        let (second, _) = ok(f.authority.rotate(&first.refresh_token).await)?;

        let replay = f.authority.rotate(&first.refresh_token).await;
        assert!(matches!(replay, Err(ApiError::Unauthenticated)));

        let (third, _) = ok(f.authority.rotate(&second.refresh_token).await)?;
        assert_ne!(third.refresh_token, second.refresh_token);
        Ok(())
    }

    #[tokio::test]
    async fn superseded_by_new_login_fails() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;

        let old = ok(f.authority.issue(&user).await)?;
        ok(f.authority.issue(&user).await)?;
        let result = f.authority.rotate(&old.refresh_token).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_then_rotate_fails() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;

        let pair = ok(f.authority.issue(&user).await)?;
        ok(f.authority.revoke(user.id).await)?;
        assert_eq!(f.sessions.len().await, 0);

        let result = f.authority.rotate(&pair.refresh_token).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
        // Revoking twice is harmless.
        ok(f.authority.revoke(user.id).await)?;
        Ok(())
    }

    #[tokio::test]
    async fn rotation_refreshes_role_from_user_record() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;
        let pair = ok(f.authority.issue(&user).await)?;

        f.users.set_role(user.id, Role::Owner).await;
        let (rotated, current) = ok(f.authority.rotate(&pair.refresh_token).await)?;
        assert_eq!(current.role, Role::Owner);
        let claims = ok(f.authority.verify_access(&rotated.access_token))?;
        assert_eq!(claims.role, Role::Owner);
        Ok(())
    }

    #[tokio::test]
    async fn deleted_user_cannot_rotate() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;
        let pair = ok(f.authority.issue(&user).await)?;

        f.users.remove(user.id).await;
        let result = f.authority.rotate(&pair.refresh_token).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn token_kinds_are_not_interchangeable() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;
        let pair = ok(f.authority.issue(&user).await)?;

        assert!(matches!(
            f.authority.verify_access(&pair.refresh_token),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            f.authority.rotate(&pair.access_token).await,
            Err(ApiError::Unauthenticated)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() -> Result<()> {
        let f = fixture();
        let user = f.users.seed("a@x.com", Role::Admin).await;
        let issued_at = Utc::now();
        let pair = ok(f.authority.issue_at(&user, issued_at).await)?;

        let later = issued_at + ChronoDuration::hours(3);
        assert!(f.authority.verify_access_at(&pair.access_token, later).is_err());
        assert!(f
            .authority
            .verify_access_at(&pair.access_token, later - ChronoDuration::seconds(1))
            .is_ok());

        let past_refresh = issued_at + ChronoDuration::days(7);
        let result = f.authority.rotate_at(&pair.refresh_token, past_refresh).await;
        assert!(matches!(result, Err(ApiError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn forged_tokens_are_rejected() -> Result<()> {
        let f = fixture();
        let forger = fixture_with_secret("someone-else");
        let user = f.users.seed("a@x.com", Role::Owner).await;
        forger.users.seed("a@x.com", Role::Owner).await;

        let forged = ok(forger.authority.issue(&user).await)?;
        assert!(matches!(
            f.authority.verify_access(&forged.access_token),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            f.authority.verify_access("not-a-jwt"),
            Err(ApiError::Unauthenticated)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn stalled_session_store_is_internal_error() -> Result<()> {
        let config = AuthConfig::new("https://quillkeep.dev".to_string()).with_io_timeout_ms(20);
        let f = fixture_with("test-signing-secret", &config);
        let user = f.users.seed("a@x.com", Role::Admin).await;
        let pair = ok(f.authority.issue(&user).await)?;

        f.sessions.set_stalled(true);
        let rotated = f.authority.rotate(&pair.refresh_token).await;
        assert!(matches!(rotated, Err(ApiError::Internal(_))));
        assert!(matches!(
            f.authority.issue(&user).await,
            Err(ApiError::Internal(_))
        ));
        assert!(matches!(
            f.authority.revoke(user.id).await,
            Err(ApiError::Internal(_))
        ));

        f.sessions.set_stalled(false);
        ok(f.authority.rotate(&pair.refresh_token).await)?;
        Ok(())
    }
}
