use std::future::Future;

/// Run `op` up to `attempts` times (at least once), retrying while
/// `is_retryable` says the last outcome deserves another try.
///
/// Returns the final outcome either way; the caller decides what a
/// still-retryable result means.
pub async fn with_retries<T, E, F, Fut, P>(attempts: usize, mut op: F, is_retryable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&Result<T, E>) -> bool,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = op().await;
        if attempt >= attempts || !is_retryable(&outcome) {
            return outcome;
        }
        tracing::debug!(attempt, attempts, "retrying collaborator call");
        attempt += 1;
    }
}
