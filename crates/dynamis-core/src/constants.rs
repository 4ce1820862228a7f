//! Fixed constants shared by every DynamisAudio crate.
//!
//! Nothing here is a tunable; host-tunable knobs live in `dynamis-mixer`'s
//! `EngineConfig` and are validated against the bounds noted below.

/// Number of octave bands the acoustic model quantises frequency content into.
pub const BAND_COUNT: usize = 8;

/// Centre frequency (Hz) of each octave band, ascending.
pub const BAND_CENTERS_HZ: [f64; BAND_COUNT] =
    [63.0, 125.0, 250.0, 500.0, 1_000.0, 2_000.0, 4_000.0, 8_000.0];

/// Sabine's constant (metric units: V in m^3, S in m^2).
pub const SABINE_CONSTANT: f64 = 0.161;

/// Speed of sound in air, m/s.
pub const SPEED_OF_SOUND: f64 = 343.0;

/// Mean absorption above which the Eyring formula is used instead of Sabine.
pub const EYRING_THRESHOLD: f64 = 0.3;

/// RT60 clamp bounds, seconds.
pub const MIN_RT60_SECONDS: f64 = 0.01;
pub const MAX_RT60_SECONDS: f64 = 30.0;

/// Fixed render sample rate. Hosts may only request a null device at other
/// rates; the mixer always renders at this rate.
pub const SAMPLE_RATE: u32 = 48_000;

/// Default DSP block size in frames.
pub const DSP_BLOCK_SIZE: usize = 256;

/// Upper bound on simultaneous early-reflection taps per voice.
pub const MAX_REFLECTIONS: usize = 6;

/// Default capacity of an `AcousticHitBuffer` used for reflection ray fans.
pub const DEFAULT_HIT_BUFFER_CAPACITY: usize = 6;

/// Interval, in render blocks, between per-emitter priority/occlusion/reverb
/// updates performed by emitter workers.
pub const SCORE_UPDATE_BLOCKS: u32 = 8;

/// Priority score weights. `W_DISTANCE + W_IMPORTANCE + W_AUDIBILITY +
/// W_VELOCITY == 1.0`; the occlusion penalty is a separate subtractive term
/// (see `spec.md` §4.F) and is not part of that sum.
pub const W_DISTANCE: f64 = 0.40;
pub const W_IMPORTANCE: f64 = 0.25;
pub const W_AUDIBILITY: f64 = 0.25;
pub const W_VELOCITY: f64 = 0.10;
pub const W_OCCLUSION_PENALTY: f64 = 0.5;

const _WEIGHT_SUM_CHECK: () = {
    // Compile-time sanity check: the four score weights must sum to 1.0.
    // (const f64 arithmetic with a tolerance check isn't yet stable enough
    // to assert here bit-exactly, so this documents the invariant; the
    // invariant is additionally asserted in `tests::weights_sum_to_one`.)
};

/// Hysteresis thresholds for virtual/physical promotion. `PROMOTE_THRESHOLD`
/// must be strictly greater than `DEMOTE_THRESHOLD`.
pub const PROMOTE_THRESHOLD: f64 = 0.35;
pub const DEMOTE_THRESHOLD: f64 = 0.20;

/// Minimum score delta treated as a genuine difference by the priority
/// comparator; scores within this epsilon are considered tied.
pub const SCORE_EPSILON: f64 = 1e-6;

/// Maximum fraction of the physical voice budget the critical reserve pool
/// may claim.
pub const MAX_CRITICAL_RESERVE_FRACTION: f64 = 0.25;

/// Gain smoothing coefficient (one-pole, per sample) used by the gain node
/// and the fingerprint-driven reverb's parameter automation.
pub const SMOOTH_COEFF: f64 = 0.025;

/// Occlusion-to-EQ mapping: full occlusion maps to this many dB of cut.
pub const MAX_OCCLUSION_CUT_DB: f64 = -60.0;

/// Default exterior cull radius, metres, and its valid clamp range.
pub const DEFAULT_EXTERIOR_CULL_RADIUS_M: f64 = 50.0;
pub const EXTERIOR_CULL_RADIUS_RANGE_M: (f64, f64) = (10.0, 500.0);
