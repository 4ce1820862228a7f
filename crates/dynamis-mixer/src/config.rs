//! `EngineConfig`: the host-set options table (spec §6) as a validated
//! builder. Every §7 "contract violation" check that can be made without
//! already owning live resources (ring capacity, reserve fraction, budget)
//! runs in [`EngineConfig::build`] so a host gets one aggregated failure
//! at startup instead of a panic three crates deep.

use thiserror::Error;

use dynamis_core::{
    CoreError, DEFAULT_EXTERIOR_CULL_RADIUS_M, DSP_BLOCK_SIZE, EXTERIOR_CULL_RADIUS_RANGE_M,
    MAX_CRITICAL_RESERVE_FRACTION, SAMPLE_RATE,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Builder for engine construction options. Defaults match the table in
/// spec §6: null sink off, brute-force ray backend off (host installs its
/// own), block size 256, a conservative voice budget.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    force_null_sink: bool,
    force_brute_force_ray_backend: bool,
    channels: usize,
    block_size: usize,
    physical_budget: usize,
    critical_reserve: usize,
    event_ring_capacity: usize,
    exterior_cull_radius_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            force_null_sink: false,
            force_brute_force_ray_backend: false,
            channels: 2,
            block_size: DSP_BLOCK_SIZE,
            physical_budget: 32,
            critical_reserve: 4,
            event_ring_capacity: 256,
            exterior_cull_radius_m: DEFAULT_EXTERIOR_CULL_RADIUS_M,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn with_null_sink(mut self, force: bool) -> Self {
        self.force_null_sink = force;
        self
    }

    pub fn with_brute_force_ray_backend(mut self, force: bool) -> Self {
        self.force_brute_force_ray_backend = force;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_physical_budget(mut self, budget: usize) -> Self {
        self.physical_budget = budget;
        self
    }

    pub fn with_critical_reserve(mut self, reserve: usize) -> Self {
        self.critical_reserve = reserve;
        self
    }

    pub fn with_event_ring_capacity(mut self, capacity: usize) -> Self {
        self.event_ring_capacity = capacity;
        self
    }

    /// Clamped to `[10, 500]` per spec §6, never an error.
    pub fn with_exterior_cull_radius_m(mut self, radius: f64) -> Self {
        let (lo, hi) = EXTERIOR_CULL_RADIUS_RANGE_M;
        self.exterior_cull_radius_m = radius.clamp(lo, hi);
        self
    }

    /// Validates every construction-time contract (spec §7) and returns
    /// the config unchanged on success.
    pub fn build(self) -> ConfigResult<Self> {
        if self.physical_budget == 0 {
            return Err(CoreError::ZeroPhysicalBudget(self.physical_budget).into());
        }
        let max_reserve = self.physical_budget as f64 * MAX_CRITICAL_RESERVE_FRACTION;
        if self.critical_reserve as f64 > max_reserve {
            return Err(CoreError::CriticalReserveTooLarge {
                reserve: self.critical_reserve,
                budget: self.physical_budget,
            }
            .into());
        }
        if self.event_ring_capacity < 2 || !self.event_ring_capacity.is_power_of_two() {
            return Err(CoreError::RingCapacityNotPowerOfTwo(self.event_ring_capacity).into());
        }
        Ok(self)
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn physical_budget(&self) -> usize {
        self.physical_budget
    }

    pub fn critical_reserve(&self) -> usize {
        self.critical_reserve
    }

    pub fn event_ring_capacity(&self) -> usize {
        self.event_ring_capacity
    }

    pub fn exterior_cull_radius_m(&self) -> f64 {
        self.exterior_cull_radius_m
    }

    pub fn force_null_sink(&self) -> bool {
        self.force_null_sink
    }

    pub fn force_brute_force_ray_backend(&self) -> bool {
        self.force_brute_force_ray_backend
    }

    /// `block_size / sample_rate`, the wall-clock duration of one render
    /// block; used by the mix-snapshot blend driver.
    pub fn block_duration_seconds(&self) -> f64 {
        self.block_size as f64 / self.sample_rate() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_cleanly() {
        assert!(EngineConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_oversized_reserve() {
        let err = EngineConfig::builder()
            .with_physical_budget(4)
            .with_critical_reserve(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Core(CoreError::CriticalReserveTooLarge { .. })));
    }

    #[test]
    fn rejects_non_power_of_two_ring() {
        let err = EngineConfig::builder()
            .with_event_ring_capacity(100)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Core(CoreError::RingCapacityNotPowerOfTwo(_))));
    }

    #[test]
    fn exterior_cull_radius_clamps_rather_than_errors() {
        let cfg = EngineConfig::builder()
            .with_exterior_cull_radius_m(5.0)
            .build()
            .unwrap();
        assert_eq!(cfg.exterior_cull_radius_m(), 10.0);
        let cfg = EngineConfig::builder()
            .with_exterior_cull_radius_m(10_000.0)
            .build()
            .unwrap();
        assert_eq!(cfg.exterior_cull_radius_m(), 500.0);
    }
}
