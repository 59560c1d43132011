/// Deadline wrapper for fallible async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum BoundedError<E> {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error(transparent)]
    Inner(E),
}

impl<E> BoundedError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, BoundedError::Elapsed(_))
    }
}

/// Await `future` for at most `duration`.
///
/// Unlike a plain `tokio::time::timeout`, the operation's own error is kept as
/// a typed value so callers can still tell failure kinds apart.
pub async fn bounded<F, T, E>(duration: Duration, future: F) -> Result<T, BoundedError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BoundedError::Inner(e)),
        Err(_) => Err(BoundedError::Elapsed(duration)),
    }
}
