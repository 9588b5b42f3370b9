//! Shared application state, built once by the server action.

use secrecy::SecretString;
use std::sync::Arc;

use super::{
    email::Mailer,
    handlers::{
        auth::{AuthConfig, CredentialVerifier, IdentityProvider, SessionStore, TokenAuthority},
        signup::{SignupEngine, SignupStore},
        users::{UserDirectory, UserStore},
    },
};

/// Collaborators behind trait objects so storage and providers can be swapped.
pub struct Collaborators {
    pub users: Arc<dyn UserStore>,
    pub signups: Arc<dyn SignupStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub mailer: Arc<dyn Mailer>,
}

pub struct AppState {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    tokens: TokenAuthority,
    credentials: CredentialVerifier,
    signups: Arc<SignupEngine>,
    directory: UserDirectory,
}

impl AppState {
    #[must_use]
    pub fn new(config: AuthConfig, jwt_secret: &SecretString, deps: Collaborators) -> Self {
        let tokens = TokenAuthority::new(
            jwt_secret,
            &config,
            deps.sessions,
            deps.users.clone(),
        );
        let credentials = CredentialVerifier::new(
            deps.users.clone(),
            deps.identity.clone(),
            config.io_timeout(),
        );
        let directory = UserDirectory::new(
            deps.users.clone(),
            deps.identity.clone(),
            config.io_timeout(),
        );
        let signups = Arc::new(SignupEngine::new(
            deps.signups,
            deps.users.clone(),
            deps.identity,
            deps.mailer,
            config.clone(),
        ));
        Self {
            config,
            users: deps.users,
            tokens,
            credentials,
            signups,
            directory,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    #[must_use]
    pub fn signups(&self) -> &Arc<SignupEngine> {
        &self.signups
    }

    #[must_use]
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }
}
