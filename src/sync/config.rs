/*!
 * Synchronization Configuration
 *
 * Spin tuning for the two-phase (spin, then block) acquire paths
 */

use crate::core::limits::{
    DEFAULT_MAX_SPINS, DEFAULT_YIELD_AFTER, LONG_WAIT_MAX_SPINS, LOW_LATENCY_MAX_SPINS,
};
use serde::{Deserialize, Serialize};

/// Synchronization configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Spin iterations before falling back to blocking
    pub max_spins: u32,
    /// Spin iterations that use a CPU hint before switching to `yield_now`
    pub yield_after: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_spins: DEFAULT_MAX_SPINS,
            yield_after: DEFAULT_YIELD_AFTER,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for very short critical sections
    pub const fn low_latency() -> Self {
        Self {
            max_spins: LOW_LATENCY_MAX_SPINS,
            yield_after: 50,
        }
    }

    /// Configuration optimized for long holds (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            max_spins: LONG_WAIT_MAX_SPINS,
            yield_after: LONG_WAIT_MAX_SPINS,
        }
    }

    /// Never spin, block on first contention
    pub const fn no_spin() -> Self {
        Self {
            max_spins: 0,
            yield_after: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_order() {
        assert!(SyncConfig::low_latency().max_spins > SyncConfig::default().max_spins);
        assert!(SyncConfig::long_wait().max_spins < SyncConfig::default().max_spins);
        assert_eq!(SyncConfig::no_spin().max_spins, 0);
    }

    #[test]
    fn test_config_roundtrip_json() {
        let config = SyncConfig::low_latency();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
