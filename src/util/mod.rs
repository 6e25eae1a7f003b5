//! Utility modules: retry backoff, timeout, cancellation.

pub mod cancel;
pub mod retry;
pub mod timeout;
