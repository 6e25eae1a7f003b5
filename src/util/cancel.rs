//! Caller-scoped cancellation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::transport::TransportError;

/// Race `future` against an optional cancellation token.
///
/// Only the wrapped future is abandoned; work shared with other callers is
/// never passed through here.
pub async fn with_cancellation<T>(
    token: Option<&CancellationToken>,
    future: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    let Some(token) = token else {
        return future.await;
    };
    if token.is_cancelled() {
        return Err(TransportError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(TransportError::Cancelled),
        result = future => result,
    }
}
