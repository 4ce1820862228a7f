//! Logical emitter: lifecycle state, the per-block parameter double
//! buffer, and the per-interval duties a cooperative worker performs
//! (occlusion, reflection fan, inline reverb gain) — spec §3, §4.F.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use portable_atomic::AtomicF64;

use dynamis_core::{
    mean, AcousticHit, BandArray, EmitterImportance, EmitterParams, EmitterParamsSource,
    EmitterState, HitBuffer, ZERO_BANDS,
};
use dynamis_dsp::{EarlyReflectionSink, VoiceHandle};
use dynamis_sim::{accumulate_bands, db_to_occlusion_bands, estimate_rt60, wet_gain, FrameSource};
use dynamis_world::WorldSnapshot;

use crate::listener::ListenerPose;
use crate::score::{priority_score, ScoreInputs};

/// Ray-fan cap for the per-interval reflection duty (spec §4.F duty 2).
const MAX_REFLECTION_FAN_DISTANCE_M: f64 = 30.0;

fn state_to_code(s: EmitterState) -> u8 {
    match s {
        EmitterState::Inactive => 0,
        EmitterState::Spawning => 1,
        EmitterState::Virtual => 2,
        EmitterState::Physical => 3,
        EmitterState::Release => 4,
    }
}

fn code_to_state(v: u8) -> EmitterState {
    match v {
        0 => EmitterState::Inactive,
        1 => EmitterState::Spawning,
        2 => EmitterState::Virtual,
        3 => EmitterState::Physical,
        _ => EmitterState::Release,
    }
}

struct ParamsSlot(UnsafeCell<EmitterParams>);
// SAFETY: exactly one writer (the owning emitter's worker) ever writes the
// back slot; readers only ever read the front slot identified by
// `published_index`, identical to the world snapshot's front/back idiom.
unsafe impl Sync for ParamsSlot {}

/// Double-buffered `EmitterParams`: the worker copies front into back,
/// mutates, then releases the flip; readers acquire the index and read
/// the indicated buffer for exactly one block (spec §4.F).
struct ParamsDoubleBuffer {
    slots: [ParamsSlot; 2],
    published_index: AtomicUsize,
}

impl Default for ParamsDoubleBuffer {
    fn default() -> Self {
        Self {
            slots: [
                ParamsSlot(UnsafeCell::new(EmitterParams::default())),
                ParamsSlot(UnsafeCell::new(EmitterParams::default())),
            ],
            published_index: AtomicUsize::new(0),
        }
    }
}

impl ParamsDoubleBuffer {
    fn read(&self) -> EmitterParams {
        let idx = self.published_index.load(Ordering::Acquire);
        // SAFETY: `idx` names the published slot; the worker never writes
        // it again until the next publish flips away from it.
        unsafe { *self.slots[idx].0.get() }
    }

    fn publish(&self, mutate: impl FnOnce(&mut EmitterParams)) {
        let front = self.published_index.load(Ordering::Acquire);
        let back = 1 - front;
        // SAFETY: sole writer of the back slot (this emitter's worker).
        unsafe {
            let front_val = *self.slots[front].0.get();
            let back_ref = &mut *self.slots[back].0.get();
            *back_ref = front_val;
            mutate(back_ref);
        }
        self.published_index.store(back, Ordering::Release);
    }
}

impl EmitterParamsSource for ParamsDoubleBuffer {
    fn params(&self) -> EmitterParams {
        self.read()
    }
}

fn sub3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm3(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn scale3(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Per-hit occlusion: a portal hit contributes `1 - aperture`; any other
/// surface contributes its material's transmission loss converted via the
/// occlusion accumulator (spec §4.E, §4.F duty 1).
fn hit_occlusion_bands(snapshot: &WorldSnapshot, hit: &AcousticHit) -> BandArray {
    if hit.portal_id != 0 {
        let open = hit.portal_aperture.clamp(0.0, 1.0);
        return [1.0 - open; dynamis_core::BAND_COUNT];
    }
    let loss_db = snapshot
        .material(hit.material_id)
        .map(|m| *m.transmission_loss_db())
        .unwrap_or(ZERO_BANDS);
    db_to_occlusion_bands(&loss_db)
}

/// A logical emitter: exclusively owned by its lifecycle worker. The
/// render thread only ever reads through [`EmitterParamsSource`].
pub struct Emitter {
    id: u64,
    importance: EmitterImportance,
    state: AtomicU8,
    score: AtomicF64,
    params: Arc<ParamsDoubleBuffer>,
    reflection_sink: Mutex<Option<Box<dyn EarlyReflectionSink>>>,
    voice_slot: Mutex<Option<VoiceHandle>>,
    pending_asset: Mutex<Option<Box<dyn FrameSource + Send>>>,
}

impl Emitter {
    pub(crate) fn new(id: u64, importance: EmitterImportance) -> Self {
        Self {
            id,
            importance,
            state: AtomicU8::new(state_to_code(EmitterState::Spawning)),
            score: AtomicF64::new(0.0),
            params: Arc::new(ParamsDoubleBuffer::default()),
            reflection_sink: Mutex::new(None),
            voice_slot: Mutex::new(None),
            pending_asset: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn importance(&self) -> EmitterImportance {
        self.importance
    }

    pub fn state(&self) -> EmitterState {
        code_to_state(self.state.load(Ordering::Acquire))
    }

    /// Applies a state transition if it is one of the sole permitted ones
    /// (spec §3); manager-driven transitions are authoritative (spec §9,
    /// open question (a)) so this always takes effect when legal.
    pub fn set_state(&self, next: EmitterState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            return false;
        }
        self.state.store(state_to_code(next), Ordering::Release);
        true
    }

    pub fn params(&self) -> EmitterParams {
        self.params.read()
    }

    /// Narrow handle a voice chain can pull per-block parameters through,
    /// without depending on this crate (spec §3, §9).
    pub fn params_handle(&self) -> Arc<dyn EmitterParamsSource> {
        self.params.clone() as Arc<dyn EmitterParamsSource>
    }

    pub fn publish_params(&self, mutate: impl FnOnce(&mut EmitterParams)) {
        self.params.publish(mutate);
    }

    pub fn score(&self) -> f64 {
        self.score.load(Ordering::Acquire)
    }

    fn set_score(&self, score: f64) {
        self.score.store(score, Ordering::Release);
    }

    pub fn voice_slot(&self) -> Option<VoiceHandle> {
        *self.voice_slot.lock()
    }

    pub(crate) fn set_voice_slot(&self, handle: Option<VoiceHandle>) {
        *self.voice_slot.lock() = handle;
    }

    pub(crate) fn install_reflection_sink(&self, sink: Box<dyn EarlyReflectionSink>) {
        *self.reflection_sink.lock() = Some(sink);
    }

    pub(crate) fn clear_reflection_sink(&self) {
        *self.reflection_sink.lock() = None;
    }

    /// Stages an asset to be bound the next time this emitter is promoted
    /// to a physical voice.
    pub fn set_pending_asset(&self, asset: Option<Box<dyn FrameSource + Send>>) {
        *self.pending_asset.lock() = asset;
    }

    pub(crate) fn take_pending_asset(&self) -> Option<Box<dyn FrameSource + Send>> {
        self.pending_asset.lock().take()
    }

    /// Runs one per-interval worker tick (spec §4.F "Per-interval
    /// duties"): emitter->listener occlusion ray, optional reflection ray
    /// fan, inline reverb gain for the current room, and the priority
    /// score. Called every `SCORE_UPDATE_BLOCKS` blocks by the owning
    /// cooperative worker.
    pub fn run_score_update(&self, snapshot: &WorldSnapshot, listener: &ListenerPose) {
        if matches!(self.state(), EmitterState::Inactive | EmitterState::Release) {
            return;
        }

        let params = self.params();
        let delta = sub3(listener.position(), params.position);
        let distance = norm3(delta);

        let occlusion_bands = if distance > 1e-6 {
            let dir = scale3(delta, 1.0 / distance);
            let mut hits = HitBuffer::new();
            snapshot.trace_ray_multi(params.position, dir, distance, &mut hits);
            let bands: Vec<BandArray> = hits
                .hits()
                .iter()
                .filter(|h| h.hit)
                .map(|h| hit_occlusion_bands(snapshot, h))
                .collect();
            accumulate_bands(bands.iter())
        } else {
            ZERO_BANDS
        };
        let mean_occlusion = mean(&occlusion_bands);

        if distance > 1e-6 {
            let mut sink_guard = self.reflection_sink.lock();
            if let Some(sink) = sink_guard.as_deref_mut() {
                let dir = scale3(delta, 1.0 / distance);
                let cast_distance = distance.min(MAX_REFLECTION_FAN_DISTANCE_M);
                let mut hits = HitBuffer::new();
                snapshot.trace_ray_multi(params.position, dir, cast_distance, &mut hits);
                sink.begin();
                for hit in hits.hits() {
                    if hit.hit {
                        sink.push_reflection(hit.distance);
                    }
                }
                sink.commit();
            }
        }

        let mut reverb_wet_gain = params.reverb_wet_gain;
        if params.room_id != 0 {
            if let Some(room) = snapshot.room(params.room_id) {
                let rt60_bands =
                    estimate_rt60(room.volume_floored(), room.surface_area_floored(), room.sabins());
                let mean_rt60 = mean(&rt60_bands);
                reverb_wet_gain = wet_gain(distance, room.volume_floored(), mean_rt60);
            }
        }

        let (azimuth, elevation) = if distance > 1e-6 {
            (delta[0].atan2(delta[2]), (delta[1] / distance).asin())
        } else {
            (0.0, 0.0)
        };

        self.publish_params(|p| {
            p.occlusion_per_band = occlusion_bands;
            p.reverb_wet_gain = reverb_wet_gain;
            p.distance = distance;
            p.azimuth = azimuth;
            p.elevation = elevation;
        });

        let velocity_magnitude = norm3(params.velocity);
        let score = priority_score(&ScoreInputs {
            distance,
            master_gain: params.master_gain,
            velocity_magnitude,
            importance: self.importance,
            mean_occlusion,
        });
        self.set_score(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_emitter_starts_spawning() {
        let e = Emitter::new(1, EmitterImportance::Normal);
        assert_eq!(e.state(), EmitterState::Spawning);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let e = Emitter::new(1, EmitterImportance::Normal);
        assert!(!e.set_state(EmitterState::Physical));
        assert_eq!(e.state(), EmitterState::Spawning);
    }

    #[test]
    fn legal_chain_of_transitions() {
        let e = Emitter::new(1, EmitterImportance::Normal);
        assert!(e.set_state(EmitterState::Virtual));
        assert!(e.set_state(EmitterState::Physical));
        assert!(e.set_state(EmitterState::Virtual));
        assert!(e.set_state(EmitterState::Release));
        assert!(e.set_state(EmitterState::Inactive));
    }

    #[test]
    fn publish_then_read_is_visible() {
        let e = Emitter::new(1, EmitterImportance::Normal);
        e.publish_params(|p| p.master_gain = 0.5);
        assert_eq!(e.params().master_gain, 0.5);
    }

    #[test]
    fn score_update_with_no_snapshot_backend_still_publishes_finite_score() {
        let e = Emitter::new(1, EmitterImportance::Normal);
        e.set_state(EmitterState::Virtual);
        e.publish_params(|p| p.position = [10.0, 0.0, 0.0]);
        let mgr = dynamis_world::WorldSnapshotManager::new();
        mgr.publish();
        let snapshot = mgr.acquire();
        let listener = ListenerPose::new();
        e.run_score_update(&snapshot, &listener);
        assert!(e.score().is_finite());
        assert!(e.score() >= 0.0);
    }
}
