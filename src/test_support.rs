//! In-memory fakes for every collaborator trait, plus a ready-made app state.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{
    email::{EmailMessage, Mailer},
    handlers::{
        auth::{
            identity::{IdentityFuture, ProviderSubject},
            AuthConfig, IdentityError, IdentityProvider, SessionStore,
        },
        signup::{
            storage::SignupInsert,
            types::{NewSignupRequest, SignupRequest, SignupStatus},
            SignupStore,
        },
        users::{InsertOutcome, NewUser, Role, User, UserStore},
    },
    state::{AppState, Collaborators},
    BoxFuture,
};

#[derive(Default)]
pub(crate) struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub(crate) async fn seed(&self, email: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: Some(email.split('@').next().unwrap_or(email).to_string()),
            avatar_url: None,
            bio: None,
            role,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().await.push(user.clone());
        user
    }

    pub(crate) async fn set_role(&self, id: Uuid, role: Role) {
        if let Some(user) = self.users.lock().await.iter_mut().find(|u| u.id == id) {
            user.role = role;
        }
    }

    pub(crate) async fn remove(&self, id: Uuid) {
        self.users.lock().await.retain(|u| u.id != id);
    }

    pub(crate) async fn count(&self) -> usize {
        self.users.lock().await.len()
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_id(&self, id: Uuid) -> BoxFuture<'_, Option<User>> {
        Box::pin(async move {
            Ok(self.users.lock().await.iter().find(|u| u.id == id).cloned())
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<User>> {
        Box::pin(async move {
            Ok(self
                .users
                .lock()
                .await
                .iter()
                .find(|u| u.email == email)
                .cloned())
        })
    }

    fn insert<'a>(&'a self, user: &'a NewUser) -> BoxFuture<'a, InsertOutcome> {
        Box::pin(async move {
            let mut users = self.users.lock().await;
            if users.iter().any(|u| u.email == user.email) {
                return Ok(InsertOutcome::Conflict);
            }
            let now = Utc::now();
            let created = User {
                id: Uuid::new_v4(),
                email: user.email.clone(),
                name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
                bio: user.bio.clone(),
                role: user.role,
                created_at: now,
                updated_at: now,
            };
            users.push(created.clone());
            Ok(InsertOutcome::Created(created))
        })
    }

    fn owner_exists(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            Ok(self
                .users
                .lock()
                .await
                .iter()
                .any(|u| u.role == Role::Owner))
        })
    }

    fn list(&self) -> BoxFuture<'_, Vec<User>> {
        Box::pin(async move {
            let mut users = self.users.lock().await.clone();
            users.sort_by_key(|u| u.created_at);
            Ok(users)
        })
    }
}

/// Mirrors the Postgres store, including the one-active-request-per-email index.
#[derive(Default)]
pub(crate) struct MemorySignupStore {
    rows: Mutex<Vec<SignupRequest>>,
}

impl MemorySignupStore {
    pub(crate) async fn latest(&self, email: &str) -> Option<SignupRequest> {
        latest_of(&self.rows.lock().await, email)
    }

    pub(crate) async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub(crate) async fn all(&self) -> Vec<SignupRequest> {
        self.rows.lock().await.clone()
    }
}

fn latest_of(rows: &[SignupRequest], email: &str) -> Option<SignupRequest> {
    // Later inserts win ties on `created_at`.
    rows.iter()
        .filter(|row| row.email == email)
        .max_by_key(|row| row.created_at)
        .cloned()
}

impl SignupStore for MemorySignupStore {
    fn latest_for_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Option<SignupRequest>> {
        Box::pin(async move { Ok(self.latest(email).await) })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'_, Option<SignupRequest>> {
        Box::pin(async move {
            Ok(self.rows.lock().await.iter().find(|row| row.id == id).cloned())
        })
    }

    fn insert<'a>(&'a self, request: &'a NewSignupRequest) -> BoxFuture<'a, SignupInsert> {
        Box::pin(async move {
            let mut rows = self.rows.lock().await;
            let active = rows.iter().any(|row| {
                row.email == request.email
                    && matches!(row.status, SignupStatus::Pending | SignupStatus::Accepted)
            });
            if active {
                return Ok(SignupInsert::Duplicate);
            }
            let row = SignupRequest {
                id: Uuid::new_v4(),
                email: request.email.clone(),
                name: request.name.clone(),
                status: SignupStatus::Pending,
                expires_at: request.expires_at,
                created_at: request.created_at,
                updated_at: request.created_at,
            };
            rows.push(row.clone());
            Ok(SignupInsert::Created(row))
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
            let mut rows = self.rows.lock().await;
            let row = rows.iter_mut().find(|row| {
                row.id == id
                    && row.status == from
                    && live_at.map_or(true, |at| row.expires_at > at)
            });
            Ok(row.map(|row| {
                row.status = to;
                row.updated_at = now;
                row.clone()
            }))
        })
    }

    fn expire_stale(&self, now: DateTime<Utc>) -> BoxFuture<'_, u64> {
        Box::pin(async move {
            let mut expired = 0;
            for row in self.rows.lock().await.iter_mut() {
                if row.expires_at < now && row.status.is_sweepable() {
                    row.status = SignupStatus::Expired;
                    row.updated_at = now;
                    expired += 1;
                }
            }
            Ok(expired)
        })
    }

    fn latest_per_email(&self) -> BoxFuture<'_, Vec<SignupRequest>> {
        Box::pin(async move {
            let rows = self.rows.lock().await;
            let mut latest: Vec<SignupRequest> = Vec::new();
            for row in rows.iter() {
                if latest.iter().any(|seen| seen.email == row.email) {
                    continue;
                }
                if let Some(newest) = latest_of(&rows, &row.email) {
                    latest.push(newest);
                }
            }
            latest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(latest)
        })
    }
}

/// How long a stalled fake sleeps; far beyond any deadline used in tests.
const STALL: Duration = Duration::from_secs(30);

#[derive(Default)]
pub(crate) struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, (Vec<u8>, DateTime<Utc>)>>,
    stalled: AtomicBool,
}

impl MemorySessionStore {
    pub(crate) async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Make every call hang until the caller's deadline fires.
    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    async fn stall(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn put<'a>(
        &'a self,
        user_id: Uuid,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.stall().await;
            self.sessions
                .lock()
                .await
                .insert(user_id, (token_hash.to_vec(), expires_at));
            Ok(())
        })
    }

    fn current(&self, user_id: Uuid, now: DateTime<Utc>) -> BoxFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move {
            self.stall().await;
            Ok(self
                .sessions
                .lock()
                .await
                .get(&user_id)
                .filter(|(_, expires_at)| *expires_at > now)
                .map(|(hash, _)| hash.clone()))
        })
    }

    fn remove(&self, user_id: Uuid) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.stall().await;
            Ok(self.sessions.lock().await.remove(&user_id).is_some())
        })
    }
}

/// Records every message; can be switched to refuse or delay delivery.
#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl RecordingMailer {
    pub(crate) async fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long before accepting each message.
    pub(crate) fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    pub(crate) async fn sent_to(&self, email: &str) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|message| message.to_email == email)
            .count()
    }

    pub(crate) async fn total(&self) -> usize {
        self.sent.lock().await.len()
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, message: &'a EmailMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("mail provider refused the message"));
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        })
    }
}

/// Identity provider backed by a map of `email -> password`.
#[derive(Default)]
pub(crate) struct StaticIdentity {
    accounts: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl StaticIdentity {
    pub(crate) async fn register(&self, email: &str, password: &str) {
        self.accounts
            .lock()
            .await
            .insert(email.to_string(), password.to_string());
    }

    pub(crate) async fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) async fn is_registered(&self, email: &str) -> bool {
        self.accounts.lock().await.contains_key(email)
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(IdentityError::Unavailable("provider offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn verify_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject> {
        Box::pin(async move {
            self.check_available()?;
            match self.accounts.lock().await.get(email) {
                Some(stored) if stored == password.expose_secret() => {
                    Ok(ProviderSubject(email.to_string()))
                }
                _ => Err(IdentityError::InvalidCredentials),
            }
        })
    }

    fn create_account<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> IdentityFuture<'a, ProviderSubject> {
        Box::pin(async move {
            self.check_available()?;
            let mut accounts = self.accounts.lock().await;
            if accounts.contains_key(email) {
                return Err(IdentityError::AlreadyRegistered);
            }
            accounts.insert(email.to_string(), password.expose_secret().to_string());
            Ok(ProviderSubject(email.to_string()))
        })
    }
}

/// App state wired to fakes, with handles kept for assertions.
pub(crate) struct TestApp {
    pub(crate) state: Arc<AppState>,
    pub(crate) users: Arc<MemoryUserStore>,
    pub(crate) signups: Arc<MemorySignupStore>,
    pub(crate) sessions: Arc<MemorySessionStore>,
    pub(crate) identity: Arc<StaticIdentity>,
    pub(crate) mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let signups = Arc::new(MemorySignupStore::default());
        let sessions = Arc::new(MemorySessionStore::default());
        let identity = Arc::new(StaticIdentity::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = Arc::new(AppState::new(
            AuthConfig::new("https://quillkeep.dev".to_string()),
            &SecretString::from("router-test-secret".to_string()),
            Collaborators {
                users: users.clone(),
                signups: signups.clone(),
                sessions: sessions.clone(),
                identity: identity.clone(),
                mailer: mailer.clone(),
            },
        ));
        Self {
            state,
            users,
            signups,
            sessions,
            identity,
            mailer,
        }
    }

    /// Seed a user known to both the user store and the identity provider.
    pub(crate) async fn with_user(&self, email: &str, password: &str, role: Role) -> User {
        self.identity.register(email, password).await;
        self.users.seed(email, role).await
    }
}
