//! Network utilities for dlna-explorer
//!
//! This module provides network-related utility functions,
//! including retry mechanisms and error handling.

use crate::config::MAX_NETWORK_RETRIES;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::sleep;

/// Retries an async operation with exponential backoff
///
/// # Arguments
/// * `operation` - The async operation to retry
/// * `operation_name` - Name of the operation for logging
///
/// # Returns
/// Returns the result of the operation or the last error if all retries fail
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{operation_name} succeeded on attempt {attempt}");
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= MAX_NETWORK_RETRIES {
                    warn!("{operation_name} failed on final attempt {attempt} ({error})");
                    return Err(error);
                }
                let delay = Duration::from_millis(100 * (1 << (attempt - 1))); // Exponential backoff
                warn!(
                    "{operation_name} failed on attempt {attempt} ({error}), retrying in {delay:?}"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(
            || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err("busy".to_string()),
                    n => Ok(n),
                }
            },
            "Probe",
        )
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(
            || async { Err(format!("failure {}", calls.fetch_add(1, Ordering::SeqCst))) },
            "Probe",
        )
        .await;
        assert_eq!(result, Err(format!("failure {}", MAX_NETWORK_RETRIES - 1)));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_NETWORK_RETRIES);
    }
}
