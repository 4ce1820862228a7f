//! Per-emitter cooperative worker scheduling envelope: one lightweight
//! worker per logical emitter, parked between work intervals with a
//! bounded wake interval and no busy-loops. OS threads, fibers, or a
//! scheduler task all satisfy this contract; this crate uses plain parked
//! `std::thread`s, the same thread-per-worker idiom as a mass-voice
//! processing core.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dynamis_core::{EmitterState, DSP_BLOCK_SIZE, SAMPLE_RATE, SCORE_UPDATE_BLOCKS};
use dynamis_world::WorldSnapshotManager;

use crate::emitter::Emitter;
use crate::listener::ListenerPose;

/// Wake interval between score-update ticks: `SCORE_UPDATE_BLOCKS *
/// DSP_BLOCK_SIZE / SAMPLE_RATE` of wall-clock time (spec §5).
pub fn wake_interval() -> Duration {
    let nanos = (SCORE_UPDATE_BLOCKS as u64 * DSP_BLOCK_SIZE as u64)
        .saturating_mul(1_000_000_000)
        / SAMPLE_RATE as u64;
    Duration::from_nanos(nanos)
}

/// Spawns one cooperative worker thread for `emitter`. The thread parks for
/// [`wake_interval`] between ticks and never busy-loops; it exits once the
/// emitter is released, after transitioning it `Release -> Inactive`
/// (spec §3: "RELEASE -> INACTIVE after tail").
pub fn spawn_worker(
    emitter: Arc<Emitter>,
    snapshot_mgr: Arc<WorldSnapshotManager>,
    listener: Arc<ListenerPose>,
) -> JoinHandle<()> {
    let interval = wake_interval();
    thread::Builder::new()
        .name(format!("dynamis-emitter-{}", emitter.id()))
        .spawn(move || loop {
            if emitter.state() == EmitterState::Release {
                emitter.set_state(EmitterState::Inactive);
                break;
            }
            let snapshot = snapshot_mgr.acquire();
            emitter.run_score_update(&snapshot, &listener);
            thread::park_timeout(interval);
        })
        .expect("failed to spawn emitter worker thread")
}
