/// Resilience primitives for broker and database calls
///
/// This library provides the small set of patterns the transaction pipeline
/// relies on when a dependency is flapping:
/// - **Retry**: a bounded attempt budget with a fixed delay between attempts
/// - **Cooldown**: a minimum wait after an exhausted budget before trying again
/// - **Bounded wait**: a deadline on a fallible future that keeps its error type
///
/// # Example: connect with a retry budget, then cool down
///
/// ```rust,no_run
/// use resilience::{with_retry, Cooldown, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let mut cooldown = Cooldown::new(Duration::from_secs(30));
///     if let Some(remaining) = cooldown.remaining() {
///         println!("try again in {}s", remaining.as_secs());
///         return;
///     }
///
///     let result = with_retry(&RetryConfig::default(), |_attempt| async {
///         // open a connection here
///         Err::<(), _>("broker unreachable")
///     })
///     .await;
///
///     if result.is_err() {
///         cooldown.record_failure();
///     }
/// }
/// ```

pub mod cooldown;
pub mod retry;
pub mod timeout;

pub use cooldown::Cooldown;
pub use retry::{with_retry, RetryConfig, RetryError};
pub use timeout::{bounded, BoundedError};
