//! dynamis-dsp: DSP nodes and the per-voice processing chain — gain, EQ,
//! compressor, reverb send, early reflections, Schroeder reverb, and the
//! fingerprint-driven reverb automation wrapper, plus the fixed-capacity
//! voice pool (spec.md §4.G, §4.H).

mod chain;
mod compressor;
mod early_reflections;
mod eq;
mod fingerprint_reverb;
mod gain;
mod node;
mod pool;
mod reverb_send;
mod schroeder;

pub use chain::VoiceNode;
pub use compressor::Compressor;
pub use early_reflections::{EarlyReflectionSink, EarlyReflections, ReflectionSinkHandle};
pub use eq::EightBandEq;
pub use fingerprint_reverb::FingerprintReverb;
pub use gain::GainNode;
pub use node::{apply_gain, bypass_copy, DspNode};
pub use pool::{VoiceHandle, VoicePool};
pub use reverb_send::ReverbSend;
pub use schroeder::SchroederReverb;
