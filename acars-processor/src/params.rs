//! Process-wide AI call tuning
//!
//! Set once at boot from `[ai]`; AI filters and annotators read it when they
//! are built and apply their own per-call overrides on top. Aircraft lookups
//! (tar1090, ADS-B Exchange) start from the shorter [`LOOKUP_TUNING`].

use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::warn;

pub use crate::config::AiTuning;
use crate::config::CallOverrides;
use crate::harness::RetryPolicy;

static AI_TUNING: OnceCell<AiTuning> = OnceCell::new();

/// Defaults for aircraft lookup calls
pub const LOOKUP_TUNING: AiTuning = AiTuning {
    timeout_seconds: 10,
    max_retry_attempts: 2,
    max_retry_delay_seconds: 1,
};

/// Install the boot-time tuning. Returns false (and keeps the first value)
/// when called again.
pub fn init_ai_tuning(tuning: AiTuning) -> bool {
    match AI_TUNING.set(tuning) {
        Ok(()) => true,
        Err(_) => {
            warn!("AI tuning already initialised; keeping the first value");
            false
        }
    }
}

/// Current tuning, or defaults when boot never set one (unit tests)
pub fn ai_tuning() -> AiTuning {
    AI_TUNING.get().cloned().unwrap_or_default()
}

/// Retry policy for one AI call site: boot tuning with overrides applied
pub fn retry_policy(overrides: &CallOverrides) -> RetryPolicy {
    apply(overrides, &ai_tuning())
}

/// Retry policy for an aircraft lookup: [`LOOKUP_TUNING`] with overrides applied
pub fn lookup_retry_policy(overrides: &CallOverrides) -> RetryPolicy {
    apply(overrides, &LOOKUP_TUNING)
}

fn apply(overrides: &CallOverrides, base: &AiTuning) -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(overrides.timeout_seconds.unwrap_or(base.timeout_seconds)),
        max_attempts: overrides
            .max_retry_attempts
            .unwrap_or(base.max_retry_attempts)
            .max(1),
        initial_delay: Duration::from_secs(
            overrides
                .max_retry_delay_seconds
                .unwrap_or(base.max_retry_delay_seconds),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = CallOverrides {
            timeout_seconds: Some(7),
            max_retry_attempts: Some(0),
            max_retry_delay_seconds: None,
        };
        let policy = retry_policy(&overrides);
        assert_eq!(policy.timeout, Duration::from_secs(7));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(
            policy.initial_delay,
            Duration::from_secs(ai_tuning().max_retry_delay_seconds)
        );
    }

    #[test]
    fn test_lookup_policy_defaults_and_overrides() {
        let policy = lookup_retry_policy(&CallOverrides::default());
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));

        let policy = lookup_retry_policy(&CallOverrides {
            timeout_seconds: None,
            max_retry_attempts: Some(5),
            max_retry_delay_seconds: Some(0),
        });
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::ZERO);
    }
}
