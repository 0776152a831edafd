use std::future::Future;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::time::Instant;

/// Everything polled here is in-process: escrow event tasks and channel teardown.
const TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `f` until it yields a value, backing off from 20ms to 250ms.
pub async fn wait_for<T, F, Fut>(description: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + TIMEOUT;
    let mut sleep_for = Duration::from_millis(20);

    while Instant::now() < deadline {
        if let Some(value) = f().await.with_context(|| format!("poll {description}"))? {
            return Ok(value);
        }
        tokio::time::sleep(sleep_for).await;
        sleep_for = (sleep_for * 2).min(Duration::from_millis(250));
    }
    anyhow::bail!("timeout waiting for {description}")
}
