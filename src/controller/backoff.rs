//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff for the consistency waits in the
//! controllers (revocation confirmation, signed metadata generation).
//! It grows more slowly than exponential backoff, so a slow remote side is
//! polled often early on without hammering it later.
//!
//! ## Usage
//!
//! ```rust
//! use federated_app_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_millis(500), Duration::from_secs(4));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(1000));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(1500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(2500));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max`.
/// Calculations are performed in whole milliseconds.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value in milliseconds
    prev_ms: u64,
    /// Current backoff value in milliseconds
    current_ms: u64,
    /// Maximum backoff value in milliseconds
    max_ms: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given minimum and maximum
    ///
    /// `min` is used for the first two values. A `max` below `min` is raised to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_ms = duration_to_ms(min).max(1);
        let max_ms = duration_to_ms(max).max(min_ms);
        Self {
            prev_ms: 0,
            current_ms: min_ms,
            max_ms,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result_ms = self.current_ms;

        let next_ms = self.prev_ms.saturating_add(self.current_ms);
        self.prev_ms = self.current_ms;
        self.current_ms = std::cmp::min(next_ms, self.max_ms);

        Duration::from_millis(result_ms)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
