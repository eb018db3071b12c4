//! Retries a read against transient storage failures. Mutating service
//! methods never go through here — re-running a whole `begin()..commit()`
//! block on a transient error risks double-applying a write, while a
//! pure read is always safe to repeat.

use backon::{ExponentialBuilder, Retryable};
use std::future::Future;

use crate::error::ServiceError;

/// Three attempts total, exponential backoff starting at 50ms.
fn policy() -> ExponentialBuilder {
    ExponentialBuilder::default().with_max_times(3).with_min_delay(std::time::Duration::from_millis(50))
}

pub async fn retry_read<T, F, Fut>(operation: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    operation.retry(policy()).when(ServiceError::is_retriable).await
}
