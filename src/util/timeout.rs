//! Per-attempt deadlines.

use std::future::Future;
use std::time::Duration;

use crate::transport::TransportError;

/// Whether `timeout` bounds a request at all. Zero means "no deadline".
pub fn is_bounded(timeout: Duration) -> bool {
    !timeout.is_zero()
}

/// Fail `future` with [`TransportError::Timeout`] once `timeout` elapses.
///
/// A zero `timeout` leaves the future unbounded.
pub async fn with_timeout<T>(
    timeout: Duration,
    future: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    if !is_bounded(timeout) {
        return future.await;
    }
    tokio::time::timeout(timeout, future)
        .await
        .unwrap_or_else(|_| Err(TransportError::Timeout(timeout.as_millis() as u64)))
}
