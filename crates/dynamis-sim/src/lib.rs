//! dynamis-sim: simulation feeders that prepare scene-derived acoustic
//! data — fingerprint build/blend, RT60 estimation, wet-gain, occlusion
//! accumulation, and asset resampling (spec.md §4.E).

mod fingerprint;
mod occlusion;
mod resampler;
mod reverb_estimator;
mod wetgain;

pub use fingerprint::{
    blend, blend_into, build_fingerprint, Fingerprint, FingerprintBlend,
};
pub use occlusion::{accumulate, accumulate_bands, db_to_occlusion, db_to_occlusion_bands};
pub use resampler::{input_frames_required, resample_linear, FrameSource, ResamplingAdapter};
pub use reverb_estimator::estimate_rt60;
