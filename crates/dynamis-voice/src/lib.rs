//! dynamis-voice: logical emitter lifecycle, priority scoring, dual-pool
//! virtual/physical promotion, and the per-emitter cooperative worker
//! scheduling envelope (spec.md §4.F, §5).

mod emitter;
mod listener;
mod manager;
mod score;
mod worker;

pub use emitter::Emitter;
pub use listener::ListenerPose;
pub use manager::{EmitterId, EmitterVoiceManager, VoiceManagerStats};
pub use score::{compare_candidates, priority_score, PriorityCandidate, ScoreInputs};
pub use worker::{spawn_worker, wake_interval};
