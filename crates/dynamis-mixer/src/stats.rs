//! Operator-facing engine counters: a point-in-time snapshot a host can
//! poll without touching the render thread's own atomics directly
//! (grounds on `dynamis-voice`'s `VoiceManagerStats` and the teacher's
//! meter-bridge pattern of exposing read-only counters to a UI thread).

use std::sync::atomic::{AtomicU64, Ordering};

use dynamis_event::EventRingStats;
use dynamis_voice::VoiceManagerStats;

/// Render-loop-local failure counters (spec §4.J "failure semantics":
/// individual node failures are contained and reported, never propagated).
#[derive(Default)]
pub(crate) struct RenderCounters {
    node_failures: AtomicU64,
    blocks_rendered: AtomicU64,
}

impl RenderCounters {
    pub fn record_node_failure(&self) {
        self.node_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self) {
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn node_failures(&self) -> u64 {
        self.node_failures.load(Ordering::Relaxed)
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered.load(Ordering::Relaxed)
    }
}

/// Aggregated engine-wide stats surfaced to a host for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    pub blocks_rendered: u64,
    pub last_block_duration_ns: u64,
    pub node_failures: u64,
    pub events: EventRingStats,
    pub voices: VoiceManagerStats,
}
