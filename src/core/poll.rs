//! Bounded polling used wherever the page gives us no event to wait on.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Re-run `probe` every `interval` until it yields a value or `timeout` elapses.
///
/// The probe always runs at least once. No probe starts after the deadline,
/// so the call returns within `timeout + interval + probe time`.
pub async fn poll_for<T, F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if started.elapsed() >= timeout {
            return None;
        }
        sleep(interval).await;
    }
}

/// Boolean form of [`poll_for`].
pub async fn poll_until<F, Fut>(interval: Duration, timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_for(interval, timeout, || {
        let check = predicate();
        async move { check.await.then_some(()) }
    })
    .await
    .is_some()
}
