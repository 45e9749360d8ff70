//! Fault injection for sequential readers.
//!
//! Readers consult an [`AsyncFailureInjector`] before every read so tests and
//! chaos runs can make reads fail, stall, or slow down without touching the
//! ledger store.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decides, per read, whether to inject a fault.
pub trait AsyncFailureInjector: Send + Sync + fmt::Debug {
    fn should_inject_errors(&self) -> bool;

    fn should_inject_delays(&self) -> bool;

    /// How long to hold a read back when delays are injected.
    fn injected_delay(&self) -> Duration;

    /// A stopped read returns no entries, as if the writer had stalled.
    fn should_inject_stops(&self) -> bool;
}

/// Never injects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFailureInjector;

impl AsyncFailureInjector for NoopFailureInjector {
    fn should_inject_errors(&self) -> bool {
        false
    }

    fn should_inject_delays(&self) -> bool {
        false
    }

    fn injected_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn should_inject_stops(&self) -> bool {
        false
    }
}

/// Odds of each fault, in percent. All zero by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureInjectionConfig {
    pub error_percent: u8,
    pub delay_percent: u8,
    pub max_delay_ms: u64,
    pub stop_percent: u8,
}

/// Injects each fault independently with the configured odds.
#[derive(Debug, Clone)]
pub struct RandomFailureInjector {
    config: FailureInjectionConfig,
}

impl RandomFailureInjector {
    pub fn new(config: FailureInjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FailureInjectionConfig {
        &self.config
    }

    fn roll(percent: u8) -> bool {
        percent > 0 && rand::thread_rng().gen_range(0..100u8) < percent
    }
}

impl AsyncFailureInjector for RandomFailureInjector {
    fn should_inject_errors(&self) -> bool {
        Self::roll(self.config.error_percent)
    }

    fn should_inject_delays(&self) -> bool {
        Self::roll(self.config.delay_percent)
    }

    fn injected_delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.config.max_delay_ms))
    }

    fn should_inject_stops(&self) -> bool {
        Self::roll(self.config.stop_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_never_fires() {
        let injector = NoopFailureInjector;
        assert!(!injector.should_inject_errors());
        assert!(!injector.should_inject_delays());
        assert!(!injector.should_inject_stops());
        assert_eq!(injector.injected_delay(), Duration::ZERO);
    }

    #[test]
    fn random_respects_extremes() {
        let always = RandomFailureInjector::new(FailureInjectionConfig {
            error_percent: 100,
            delay_percent: 0,
            max_delay_ms: 5,
            stop_percent: 100,
        });
        for _ in 0..50 {
            assert!(always.should_inject_errors());
            assert!(always.should_inject_stops());
            assert!(!always.should_inject_delays());
            assert!(always.injected_delay() <= Duration::from_millis(5));
        }
    }
}
