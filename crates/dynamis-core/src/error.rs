//! Error taxonomy for DynamisAudio.
//!
//! Mirrors the kinds (not types) described in `spec.md` §7: contract
//! violations are fatal at construction and are never silently corrected.
//! Runtime saturation and transient I/O are not modelled as `Result`
//! errors at all — they are counters and logged signals, since the render
//! thread must never propagate an error out of its per-block loop.

use thiserror::Error;

/// Fatal, construction-time contract violation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("ring capacity {0} is not a power of two")]
    RingCapacityNotPowerOfTwo(usize),

    #[error("critical reserve {reserve} exceeds 25% of physical budget {budget}")]
    CriticalReserveTooLarge { reserve: usize, budget: usize },

    #[error("physical budget must be >= 1, got {0}")]
    ZeroPhysicalBudget(usize),

    #[error("non-finite value in {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("negative capacity requested for {field}: {value}")]
    NegativeCapacity { field: &'static str, value: isize },

    #[error("room volume must be > 0, got {0}")]
    NonPositiveVolume(f64),

    #[error("room surface area must be > 0, got {0}")]
    NonPositiveSurfaceArea(f64),

    #[error("portal {portal_id} is tagged PORTAL but carries portal_id == 0")]
    PortalIdZero { portal_id: u32 },

    #[error("band value out of range [{lo}, {hi}] for {field}: {value}")]
    BandValueOutOfRange {
        field: &'static str,
        value: f64,
        lo: f64,
        hi: f64,
    },

    #[error("null handle supplied for {0}")]
    NullHandle(&'static str),
}

pub type CoreResult<T> = Result<T, CoreError>;
