//! Daily expiry sweep for sign-up requests.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error};

use super::engine::SignupEngine;

const FALLBACK_WAIT: Duration = Duration::from_secs(60);

/// Time from `now` until the next `hour_utc:00:00`. Always positive.
pub(crate) fn until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let Some(today) = now.date_naive().and_hms_opt(hour_utc, 0, 0) else {
        return FALLBACK_WAIT;
    };
    let mut next = today.and_utc();
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(FALLBACK_WAIT)
}

/// Run `sweep` once a day at `hour_utc`. Failures are logged and retried the next day.
pub fn spawn_sweeper(engine: Arc<SignupEngine>, hour_utc: u32) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_run(Utc::now(), hour_utc);
            debug!(wait_seconds = wait.as_secs(), "next sign-up sweep scheduled");
            sleep(wait).await;

            if let Err(err) = engine.sweep().await {
                error!("sign-up sweep failed: {err}");
            }
        }
    })
}
