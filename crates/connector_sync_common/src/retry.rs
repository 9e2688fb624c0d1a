use std::time::Duration;

use crate::constants::RETRY_INTERVAL_SECONDS;

/// Runs `attempt` up to `max_attempts` times, sleeping
/// `RETRY_INTERVAL_SECONDS ** attempt_number` between tries (§5's bounded
/// exponential backoff). Returns the first success, or the last error once
/// attempts are exhausted. `should_retry` lets the caller decide whether a
/// given error is worth retrying at all (e.g. only `Transport` /
/// `ConflictExhausted` kinds, per §7).
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    mut should_retry: impl FnMut(&E) -> bool,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt_number in 0..max_attempts {
        match attempt(attempt_number).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt_number + 1 < max_attempts && should_retry(&err) {
                    let backoff = RETRY_INTERVAL_SECONDS.saturating_pow(attempt_number + 1);
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                last_err = Some(err);
            },
        }
    }
    Err(last_err.expect("max_attempts must be >= 1"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    use proptest::prelude::*;

    use super::*;

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            |_| true,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_retrying_when_should_retry_is_false() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            5,
            |_| false,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
        )
        .await;
        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retryable_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            |_| true,
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 2 {
                        Ok(7)
                    } else {
                        Err("conflict")
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    proptest! {
        /// When every attempt fails and every error is retryable, the
        /// attempt closure runs exactly `max_attempts` times, never more
        /// and never fewer (§5).
        #[test]
        fn always_runs_exactly_max_attempts_when_nothing_succeeds(max_attempts in 1u32..6) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let calls = AtomicU32::new(0);
            let result: Result<u32, &str> = rt.block_on(retry_with_backoff(
                max_attempts,
                |_| true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("always fails") }
                },
            ));
            prop_assert_eq!(result, Err("always fails"));
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
        }
    }
}
