//! Per-call deadline for I/O against external collaborators.

use anyhow::{anyhow, Result};
use std::{future::Future, time::Duration};

/// Run `future` under `limit`; an elapsed deadline becomes an error naming `operation`.
pub(crate) async fn within<T, F>(limit: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        )),
    }
}
