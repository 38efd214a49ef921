//! Simulated payment latency.

use serde::{Deserialize, Serialize};
use shared_types::{round_half_up, NetworkMode, PaymentOutcome};
use std::time::Duration;

/// Default delay before a payment resolves.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1200);
/// Default delay when the outcome toggle is `timeout`.
pub const DEFAULT_TIMEOUT_DELAY: Duration = Duration::from_millis(4500);
/// Default multiplier on a slow network.
pub const DEFAULT_SLOW_FACTOR: f64 = 2.3;

/// Delay parameters for the simulated acquirer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentTiming {
    pub base_delay: Duration,
    pub timeout_delay: Duration,
    pub slow_factor: f64,
}

impl Default for PaymentTiming {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            timeout_delay: DEFAULT_TIMEOUT_DELAY,
            slow_factor: DEFAULT_SLOW_FACTOR,
        }
    }
}

impl PaymentTiming {
    /// Delay before a payment with `outcome` resolves on `network`.
    ///
    /// A `down` network never schedules a resolution; it yields zero.
    pub fn delay_for(&self, outcome: PaymentOutcome, network: NetworkMode) -> Duration {
        let base = match outcome {
            PaymentOutcome::Timeout => self.timeout_delay,
            PaymentOutcome::Success | PaymentOutcome::Fail => self.base_delay,
        };
        match network {
            NetworkMode::Normal => base,
            NetworkMode::Slow => {
                let millis = base.as_millis() as f64 * self.slow_factor.max(1.0);
                Duration::from_millis(round_half_up(millis).max(0) as u64)
            }
            NetworkMode::Down => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let t = PaymentTiming::default();
        assert_eq!(
            t.delay_for(PaymentOutcome::Success, NetworkMode::Normal),
            Duration::from_millis(1200)
        );
        assert_eq!(
            t.delay_for(PaymentOutcome::Fail, NetworkMode::Slow),
            Duration::from_millis(2760)
        );
        assert_eq!(
            t.delay_for(PaymentOutcome::Timeout, NetworkMode::Normal),
            Duration::from_millis(4500)
        );
    }

    #[test]
    fn test_timeout_is_materially_longer() {
        let t = PaymentTiming::default();
        for network in [NetworkMode::Normal, NetworkMode::Slow] {
            assert!(
                t.delay_for(PaymentOutcome::Timeout, network)
                    > t.delay_for(PaymentOutcome::Fail, network) * 2
            );
        }
    }
}
