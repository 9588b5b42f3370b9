//! Identity provider client and the credential verifier built on it.
//!
//! Flow Overview:
//! 1) Login looks up the user row by normalized email; unknown emails fail.
//! 2) The password is checked by the identity provider (GoTrue-style
//!    `POST /auth/v1/token?grant_type=password`); we never see a hash.
//! 3) Any rejection collapses into `Unauthenticated` for the caller.

use anyhow::Context;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

use crate::api::{
    deadline,
    error::{ApiError, ApiResult},
    handlers::users::{User, UserStore},
};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account already registered")]
    AlreadyRegistered,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

pub type IdentityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IdentityError>> + Send + 'a>>;

/// Subject id assigned by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSubject(pub String);

/// Managed identity provider that owns passwords.
pub trait IdentityProvider: Send + Sync {
    fn verify_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject>;

    fn create_account<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject>;
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct AdminCreateUser<'a> {
    email: &'a str,
    password: &'a str,
    email_confirm: bool,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: String,
}

#[derive(Deserialize)]
struct TokenGrantResponse {
    user: ProviderUser,
}

/// Client for a GoTrue-compatible auth API (Supabase Auth).
#[derive(Debug)]
pub struct GoTrueProvider {
    client: Client,
    base_url: String,
    service_key: SecretString,
}

impl GoTrueProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, service_key: SecretString) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build identity provider HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn unavailable(err: impl std::fmt::Display) -> IdentityError {
    IdentityError::Unavailable(err.to_string())
}

impl IdentityProvider for GoTrueProvider {
    fn verify_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject> {
        Box::pin(async move {
            let url = self.endpoint("/auth/v1/token?grant_type=password");
            let span = info_span!("identity.verify_password", http.url = %url);
            let response = self
                .client
                .post(&url)
                .header("apikey", self.service_key.expose_secret())
                .json(&PasswordGrant {
                    email,
                    password: password.expose_secret(),
                })
                .send()
                .instrument(span)
                .await
                .map_err(unavailable)?;

            match response.status() {
                status if status.is_success() => {
                    let grant: TokenGrantResponse = response.json().await.map_err(unavailable)?;
                    Ok(ProviderSubject(grant.user.id))
                }
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    Err(IdentityError::InvalidCredentials)
                }
                status => Err(IdentityError::Unavailable(format!(
                    "unexpected status {status}"
                ))),
            }
        })
    }

    fn create_account<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject> {
        Box::pin(async move {
            let url = self.endpoint("/auth/v1/admin/users");
            let span = info_span!("identity.create_account", http.url = %url);
            let response = self
                .client
                .post(&url)
                .header("apikey", self.service_key.expose_secret())
                .bearer_auth(self.service_key.expose_secret())
                .json(&AdminCreateUser {
                    email,
                    password: password.expose_secret(),
                    email_confirm: true,
                })
                .send()
                .instrument(span)
                .await
                .map_err(unavailable)?;

            match response.status() {
                status if status.is_success() => {
                    let user: ProviderUser = response.json().await.map_err(unavailable)?;
                    Ok(ProviderSubject(user.id))
                }
                StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(IdentityError::AlreadyRegistered)
                }
                status => Err(IdentityError::Unavailable(format!(
                    "unexpected status {status}"
                ))),
            }
        })
    }
}

/// Run an identity call under the I/O deadline.
pub(crate) async fn bounded<T>(
    limit: Duration,
    future: IdentityFuture<'_, T>,
) -> Result<T, IdentityError> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(IdentityError::Unavailable(format!(
            "timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Email + password check: the user row must exist and the provider must accept the password.
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
    io_timeout: Duration,
}

impl CredentialVerifier {
    pub fn new(
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            users,
            identity,
            io_timeout,
        }
    }

    /// Verify credentials and return the matching user.
    ///
    /// # Errors
    /// `Unauthenticated` for unknown emails or rejected passwords, `Internal`
    /// when the store or the provider cannot answer.
    pub async fn verify(&self, email: &str, password: &SecretString) -> ApiResult<User> {
        let user = deadline::within(
            self.io_timeout,
            "user lookup",
            self.users.find_by_email(email),
        )
        .await?;
        let Some(user) = user else {
            debug!("login rejected: unknown email");
            return Err(ApiError::Unauthenticated);
        };

        match bounded(
            self.io_timeout,
            self.identity.verify_password(email, password),
        )
        .await
        {
            Ok(_subject) => Ok(user),
            Err(IdentityError::InvalidCredentials) => {
                debug!(user_id = %user.id, "login rejected: provider refused password");
                Err(ApiError::Unauthenticated)
            }
            Err(err) => Err(ApiError::Internal(anyhow::anyhow!(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::users::Role;
    use crate::test_support::{MemoryUserStore, StaticIdentity};
    use anyhow::Result;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    async fn verifier_with_user() -> Result<CredentialVerifier> {
        let users = Arc::new(MemoryUserStore::default());
        users.seed("owner@x.com", Role::Owner).await;
        let identity = Arc::new(StaticIdentity::default());
        identity.register("owner@x.com", "correct horse").await;
        Ok(CredentialVerifier::new(
            users,
            identity,
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn accepts_known_user_with_right_password() -> Result<()> {
        let verifier = verifier_with_user().await?;
        let user = verifier
            .verify("owner@x.com", &secret("correct horse"))
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(user.role, Role::Owner);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() -> Result<()> {
        let verifier = verifier_with_user().await?;
        let wrong = verifier.verify("owner@x.com", &secret("nope")).await;
        let unknown = verifier.verify("ghost@x.com", &secret("correct horse")).await;
        assert!(matches!(wrong, Err(ApiError::Unauthenticated)));
        assert!(matches!(unknown, Err(ApiError::Unauthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn provider_outage_is_internal() -> Result<()> {
        let users = Arc::new(MemoryUserStore::default());
        users.seed("owner@x.com", Role::Owner).await;
        let identity = Arc::new(StaticIdentity::default());
        identity.set_unavailable(true).await;
        let verifier = CredentialVerifier::new(users, identity, Duration::from_secs(1));
        let result = verifier.verify("owner@x.com", &secret("whatever")).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
        Ok(())
    }

    #[test]
    fn gotrue_endpoint_joins_without_double_slash() -> Result<()> {
        let provider = GoTrueProvider::new("https://auth.example.com/", secret("k"))?;
        assert_eq!(
            provider.endpoint("/auth/v1/admin/users"),
            "https://auth.example.com/auth/v1/admin/users"
        );
        Ok(())
    }
}
