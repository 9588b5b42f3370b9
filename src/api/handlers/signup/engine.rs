//! Sign-up request lifecycle.
//!
//! ```text
//!            request()               approve(accepted)
//!  (none) ───────────► pending ─────────────────────► accepted ──createAccount()──► consumed
//!                         │ approve(rejected)
//!                         ▼
//!                      rejected
//!  pending/accepted/rejected ──(sweep: expires_at < now)──► expired
//! ```
//!
//! Notification emails are sent before the status write. A delivery failure
//! aborts the operation and leaves the stored state untouched.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    storage::{SignupInsert, SignupStore},
    types::{
        CreateAccountRequest, Decision, NewSignupRequest, SignupReceipt, SignupRequest,
        SignupStatus,
    },
};
use crate::api::{
    deadline,
    email::{self, EmailMessage, Mailer},
    error::{ApiError, ApiResult},
    handlers::{
        auth::{
            identity::{bounded, IdentityError, IdentityProvider},
            principal::{require_owner, Principal},
            utils::{normalize_email, valid_email},
            AuthConfig,
        },
        users::{InsertOutcome, NewUser, Role, User, UserStore},
    },
};

pub struct SignupEngine {
    store: Arc<dyn SignupStore>,
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
}

impl SignupEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn SignupStore>,
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn Mailer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            users,
            identity,
            mailer,
            config,
        }
    }

    fn io_timeout(&self) -> Duration {
        self.config.io_timeout()
    }

    async fn deliver(&self, message: &EmailMessage) -> ApiResult<()> {
        deadline::within(self.io_timeout(), "email delivery", self.mailer.send(message))
            .await
            .map_err(|err| {
                warn!(error = %err, "notification email was not accepted");
                ApiError::bad_request("Failed to send notification email")
            })
    }

    /// The completion link only ever travels by email; the receipt never
    /// carries the request id.
    fn receipt(request: &SignupRequest, created: bool) -> SignupReceipt {
        SignupReceipt {
            status: request.status,
            can_resend: false,
            expires_at: request.expires_at,
            created,
        }
    }

    /// Ask to join the blog.
    ///
    /// # Errors
    /// `BadRequest` for malformed input or when the acknowledgement email
    /// cannot be sent, `Conflict` when the email already has an account.
    pub async fn request(&self, email: &str, name: &str) -> ApiResult<SignupReceipt> {
        self.request_at(email, name, Utc::now()).await
    }

    pub(crate) async fn request_at(
        &self,
        email: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<SignupReceipt> {
        let email = normalize_email(email);
        let name = name.trim();
        if !valid_email(&email) {
            return Err(ApiError::bad_request("Invalid email"));
        }
        if name.is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }

        let existing = deadline::within(
            self.io_timeout(),
            "user lookup",
            self.users.find_by_email(&email),
        )
        .await?;
        if existing.is_some() {
            return Err(ApiError::conflict("An account with this email already exists"));
        }

        let latest = deadline::within(
            self.io_timeout(),
            "sign-up lookup",
            self.store.latest_for_email(&email),
        )
        .await?;
        if let Some(latest) = latest {
            let active = matches!(
                latest.status,
                SignupStatus::Pending | SignupStatus::Accepted
            );
            if active && latest.is_live(now) {
                debug!(request_id = %latest.id, status = %latest.status, "sign-up already in flight");
                return Ok(Self::receipt(&latest, false));
            }
            if active {
                // Past its deadline but not swept yet; retire it so the new row can take over.
                deadline::within(
                    self.io_timeout(),
                    "sign-up expire",
                    self.store
                        .transition(latest.id, latest.status, SignupStatus::Expired, None, now),
                )
                .await?;
            }
        }

        self.deliver(&email::signup_received(&email, name)).await?;

        let new_request = NewSignupRequest {
            email: email.clone(),
            name: name.to_string(),
            expires_at: now + ChronoDuration::seconds(self.config.signup_ttl_seconds()),
            created_at: now,
        };
        let inserted = deadline::within(
            self.io_timeout(),
            "sign-up insert",
            self.store.insert(&new_request),
        )
        .await?;

        match inserted {
            SignupInsert::Created(request) => {
                info!(request_id = %request.id, "sign-up request created");
                Ok(Self::receipt(&request, true))
            }
            SignupInsert::Duplicate => {
                let winner = deadline::within(
                    self.io_timeout(),
                    "sign-up lookup",
                    self.store.latest_for_email(&email),
                )
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(anyhow::anyhow!(
                        "sign-up insert conflicted but no active request was found"
                    ))
                })?;
                Ok(Self::receipt(&winner, false))
            }
        }
    }

    /// Owner decision on a pending request.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `NotFound` for unknown ids, `BadRequest`
    /// when the request is not pending, has expired, loses a concurrent
    /// decision, or the notification email fails.
    pub async fn approve(
        &self,
        acting: &Principal,
        request_id: Uuid,
        decision: Decision,
    ) -> ApiResult<SignupRequest> {
        self.approve_at(acting, request_id, decision, Utc::now())
            .await
    }

    pub(crate) async fn approve_at(
        &self,
        acting: &Principal,
        request_id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> ApiResult<SignupRequest> {
        require_owner(acting)?;

        let request = deadline::within(
            self.io_timeout(),
            "sign-up lookup",
            self.store.find(request_id),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Sign-up request not found"))?;

        if request.status != SignupStatus::Pending {
            return Err(ApiError::bad_request(format!(
                "Sign-up request is {}, not pending",
                request.status
            )));
        }
        if !request.is_live(now) {
            return Err(ApiError::bad_request("Sign-up request has expired"));
        }

        let message = match decision {
            Decision::Accept => email::signup_accepted(
                &request.email,
                &request.name,
                &self.config.completion_url(request.id),
            ),
            Decision::Reject => email::signup_rejected(&request.email, &request.name),
        };
        self.deliver(&message).await?;

        let updated = deadline::within(
            self.io_timeout(),
            "sign-up decision",
            self.store.transition(
                request.id,
                SignupStatus::Pending,
                decision.target(),
                Some(now),
                now,
            ),
        )
        .await?
        .ok_or_else(|| ApiError::bad_request("Sign-up request was already decided"))?;

        info!(
            request_id = %updated.id,
            status = %updated.status,
            owner_id = %acting.id,
            "sign-up request decided"
        );
        Ok(updated)
    }

    /// Materialize the account for an accepted request. Single use.
    ///
    /// # Errors
    /// `NotFound` unless the request exists, is accepted and unexpired;
    /// `BadRequest` for an empty password; `Conflict` when the identity or the
    /// user row already exists; `Internal` on collaborator failures.
    pub async fn create_account(&self, input: &CreateAccountRequest) -> ApiResult<User> {
        self.create_account_at(input, Utc::now()).await
    }

    pub(crate) async fn create_account_at(
        &self,
        input: &CreateAccountRequest,
        now: DateTime<Utc>,
    ) -> ApiResult<User> {
        if input.password.is_empty() {
            return Err(ApiError::bad_request("Password is required"));
        }

        let request = deadline::within(
            self.io_timeout(),
            "sign-up consume",
            self.store.transition(
                input.signup_request_id,
                SignupStatus::Accepted,
                SignupStatus::Consumed,
                Some(now),
                now,
            ),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Sign-up request not found or not accepted"))?;

        match self.materialize(&request, input).await {
            Ok(user) => {
                info!(user_id = %user.id, request_id = %request.id, "account created");
                Ok(user)
            }
            Err(err) => {
                self.release(&request, now).await;
                Err(err)
            }
        }
    }

    async fn materialize(
        &self,
        request: &SignupRequest,
        input: &CreateAccountRequest,
    ) -> ApiResult<User> {
        let password = SecretString::from(input.password.clone());
        match bounded(
            self.io_timeout(),
            self.identity.create_account(&request.email, &password),
        )
        .await
        {
            Ok(_) => {}
            Err(IdentityError::AlreadyRegistered) => {
                return Err(ApiError::conflict("An account with this email already exists"));
            }
            Err(err) => return Err(ApiError::Internal(anyhow::anyhow!(err))),
        }

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&request.name);
        let new_user = NewUser {
            email: request.email.clone(),
            name: Some(name.to_string()),
            avatar_url: input.avatar_url.clone(),
            bio: input.bio.clone(),
            role: Role::Admin,
        };
        match deadline::within(self.io_timeout(), "user insert", self.users.insert(&new_user))
            .await?
        {
            InsertOutcome::Created(user) => Ok(user),
            InsertOutcome::Conflict => Err(ApiError::conflict(
                "An account with this email already exists",
            )),
        }
    }

    /// Best-effort `consumed -> accepted` after a failed account creation.
    async fn release(&self, request: &SignupRequest, now: DateTime<Utc>) {
        let result = deadline::within(
            self.io_timeout(),
            "sign-up release",
            self.store.transition(
                request.id,
                SignupStatus::Consumed,
                SignupStatus::Accepted,
                None,
                now,
            ),
        )
        .await;
        if let Err(err) = result {
            warn!(request_id = %request.id, error = %err, "failed to release consumed sign-up request");
        }
    }

    /// Expire every pending/accepted/rejected request past its deadline.
    ///
    /// # Errors
    /// `Internal` if storage fails.
    pub async fn sweep(&self) -> ApiResult<u64> {
        self.sweep_at(Utc::now()).await
    }

    pub(crate) async fn sweep_at(&self, now: DateTime<Utc>) -> ApiResult<u64> {
        let expired = deadline::within(
            self.io_timeout(),
            "sign-up sweep",
            self.store.expire_stale(now),
        )
        .await?;
        info!(expired, "sign-up sweep finished");
        Ok(expired)
    }

    /// Newest request per email, newest first. Owner only.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `Internal` if storage fails.
    pub async fn list(&self, acting: &Principal) -> ApiResult<Vec<SignupRequest>> {
        require_owner(acting)?;
        let requests = deadline::within(
            self.io_timeout(),
            "sign-up list",
            self.store.latest_per_email(),
        )
        .await?;
        Ok(requests)
    }

    /// Public status lookup used by the completion page.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub async fn check(&self, request_id: Uuid) -> ApiResult<SignupRequest> {
        deadline::within(
            self.io_timeout(),
            "sign-up lookup",
            self.store.find(request_id),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Sign-up request not found"))
    }
}
