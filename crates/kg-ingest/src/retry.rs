//! Retry policy for per-item attempts.
//!
//! The policy is a plain value handed to the processor. Each item gets
//! a fresh [`RetrySchedule`] from it, so delays never carry over from
//! one item to the next.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use kg_types::{DelayStrategyKind, RetrySettings};

use crate::error::AttemptError;

/// How long to wait before each retry.
#[derive(Debug, Clone, PartialEq)]
pub enum DelayStrategy {
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay multiplied after each retry, capped at `max`
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

/// Bounded retry policy: total attempts per item and the delay between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayStrategy,
}

impl RetryPolicy {
    /// Retry up to `max_attempts` total attempts with a fixed delay.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: DelayStrategy::Fixed(delay),
        }
    }

    /// Retry with a doubling delay starting at `initial`, capped at `max`.
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: DelayStrategy::Exponential {
                initial,
                max,
                multiplier: 2.0,
            },
        }
    }

    /// A single attempt per item.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Build the policy described by configuration.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let delay = Duration::from_millis(settings.delay_ms);
        match settings.strategy {
            DelayStrategyKind::Fixed => Self::fixed(settings.max_attempts, delay),
            DelayStrategyKind::Exponential => Self::exponential(
                settings.max_attempts,
                delay,
                Duration::from_millis(settings.max_delay_ms),
            ),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> &DelayStrategy {
        &self.delay
    }

    /// Start the delay sequence for one item.
    pub fn schedule(&self) -> RetrySchedule {
        match &self.delay {
            DelayStrategy::Fixed(delay) => RetrySchedule::Fixed(*delay),
            DelayStrategy::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let backoff = ExponentialBackoffBuilder::new()
                    .with_initial_interval(*initial)
                    .with_max_interval(*max)
                    .with_multiplier(*multiplier)
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build();
                RetrySchedule::Exponential {
                    backoff,
                    max: *max,
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// Delay sequence for the retries of one item.
#[derive(Debug)]
pub enum RetrySchedule {
    Fixed(Duration),
    Exponential {
        backoff: ExponentialBackoff,
        max: Duration,
    },
}

impl RetrySchedule {
    /// Delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        match self {
            RetrySchedule::Fixed(delay) => *delay,
            RetrySchedule::Exponential { backoff, max } => {
                backoff.next_backoff().unwrap_or(*max).min(*max)
            }
        }
    }
}

/// Result of one transform-then-commit attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Both steps succeeded; `units` documents were written
    Committed { units: usize },
    /// Failed, another attempt may succeed
    Retryable(AttemptError),
    /// Failed, retrying will not help
    Permanent(AttemptError),
}

impl AttemptOutcome {
    /// Classify the result of an attempt.
    pub fn classify(result: Result<usize, AttemptError>) -> Self {
        match result {
            Ok(units) => AttemptOutcome::Committed { units },
            Err(e) if e.is_retryable() => AttemptOutcome::Retryable(e),
            Err(e) => AttemptOutcome::Permanent(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SinkError, TransformError};

    #[test]
    fn test_fixed_schedule_repeats_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
        let mut schedule = policy.schedule();
        assert_eq!(schedule.next_delay(), Duration::from_millis(250));
        assert_eq!(schedule.next_delay(), Duration::from_millis(250));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_exponential_schedule_grows_and_caps() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(350));
        let mut schedule = policy.schedule();
        let delays: Vec<u128> = (0..4).map(|_| schedule.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_each_schedule_starts_over() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(10));
        let mut first = policy.schedule();
        first.next_delay();
        first.next_delay();
        assert_eq!(policy.schedule().next_delay().as_millis(), 100);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_attempts: 4,
            delay_ms: 10,
            strategy: DelayStrategyKind::Exponential,
            max_delay_ms: 80,
        };
        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(
            policy.delay(),
            &DelayStrategy::Exponential {
                initial: Duration::from_millis(10),
                max: Duration::from_millis(80),
                multiplier: 2.0,
            }
        );

        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), &DelayStrategy::Fixed(Duration::from_secs(2)));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            AttemptOutcome::classify(Ok(2)),
            AttemptOutcome::Committed { units: 2 }
        ));
        assert!(matches!(
            AttemptOutcome::classify(Err(TransformError::Timeout.into())),
            AttemptOutcome::Retryable(_)
        ));
        assert!(matches!(
            AttemptOutcome::classify(Err(SinkError::Closed.into())),
            AttemptOutcome::Permanent(_)
        ));
    }
}
