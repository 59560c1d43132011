/// Failure cooldown gate
///
/// After a dependency has been declared unreachable, callers must wait out a
/// fixed window before another connection attempt is allowed. The gate itself
/// is not synchronized; the owner keeps it behind whatever lock already guards
/// the connection handle.
///
/// Timing uses `tokio::time::Instant` so paused-clock tests can drive it.
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    last_failure: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_failure: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mark the current instant as the latest failure
    pub fn record_failure(&mut self) {
        self.last_failure = Some(Instant::now());
    }

    /// Forget any recorded failure
    pub fn reset(&mut self) {
        if self.last_failure.take().is_some() {
            info!("Cooldown cleared after successful attempt");
        }
    }

    /// Time left before another attempt is allowed, `None` when the gate is open
    pub fn remaining(&self) -> Option<Duration> {
        let failed_at = self.last_failure?;
        let elapsed = failed_at.elapsed();
        if elapsed >= self.window {
            None
        } else {
            Some(self.window - elapsed)
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.remaining().is_some()
    }

    /// Remaining wait rounded up to whole seconds, for "retry after" hints
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.remaining().map(|left| {
            let secs = left.as_secs();
            if left.subsec_nanos() > 0 {
                secs + 1
            } else {
                secs
            }
        })
    }
}
