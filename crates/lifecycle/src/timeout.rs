use std::future::Future;
use std::time::Duration;

use crate::error::LifecycleError;

/// Run one backend call under a time limit.
pub(crate) async fn bounded<T, E>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, LifecycleError>
where
    LifecycleError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(LifecycleError::from),
        Err(_) => Err(LifecycleError::Timeout {
            operation,
            after: limit,
        }),
    }
}
