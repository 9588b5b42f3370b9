//! Auth and admission configuration.

use std::time::Duration;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 3 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SIGNUP_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    signup_ttl_seconds: i64,
    io_timeout_ms: u64,
    sweep_hour_utc: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            signup_ttl_seconds: DEFAULT_SIGNUP_TTL_SECONDS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            sweep_hour_utc: 0,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_signup_ttl_seconds(mut self, seconds: i64) -> Self {
        self.signup_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_io_timeout_ms(mut self, millis: u64) -> Self {
        self.io_timeout_ms = millis;
        self
    }

    /// Hour of day (UTC, 0-23) at which the expiry sweep runs; clamped to 23.
    #[must_use]
    pub fn with_sweep_hour_utc(mut self, hour: u32) -> Self {
        self.sweep_hour_utc = hour.min(23);
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn signup_ttl_seconds(&self) -> i64 {
        self.signup_ttl_seconds
    }

    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    #[must_use]
    pub fn sweep_hour_utc(&self) -> u32 {
        self.sweep_hour_utc
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    /// Link sent in the approval email and returned for accepted requests.
    #[must_use]
    pub fn completion_url(&self, request_id: uuid::Uuid) -> String {
        let base = self.frontend_base_url.trim_end_matches('/');
        format!("{base}/signup/complete?requestId={request_id}")
    }
}
