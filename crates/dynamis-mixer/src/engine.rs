//! The mixer render loop (spec §4.J): per-block orchestration wiring every
//! other component together — event ring drain, snapshot acquire, the
//! per-voice DSP sweep, the bus graph, and the device sink — under the
//! render thread's allocation and failure-containment contract (spec §5,
//! §7).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use dynamis_core::{CoreError, EmitterImportance, Material, Sample, SCORE_UPDATE_BLOCKS};
use dynamis_dsp::VoiceHandle;
use dynamis_event::{event_ring, EventConsumer, EventProducer, TopologyEvent};
use dynamis_voice::{Emitter, EmitterId, EmitterVoiceManager, ListenerPose};
use dynamis_world::{RayBackend, WorldSnapshotManager};

use crate::bus::{AudioBus, MixBusControl};
use crate::config::EngineConfig;
use crate::mix_snapshot::{MixSnapshotManager, MixSnapshotRequest};
use crate::sink::{AudioSink, SinkError};
use crate::stats::{EngineStats, RenderCounters};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Host-side handles returned alongside a freshly built [`Engine`]: the
/// event producer and the two double-buffered shared structures the game
/// thread and emitter workers write into directly (spec §5).
pub struct EngineHandles {
    pub event_producer: EventProducer,
    pub snapshot: Arc<WorldSnapshotManager>,
    pub listener: Arc<ListenerPose>,
}

/// Names of the three fixed top-level buses the mixer wires up. A host
/// wanting more buses adds them as sources under these via
/// [`Engine::sfx_bus_mut`] / [`Engine::reverb_bus_mut`] / [`Engine::master_bus_mut`].
pub const SFX_BUS_NAME: &str = "SFX";
pub const REVERB_BUS_NAME: &str = "Reverb";
pub const MASTER_BUS_NAME: &str = "Master";

/// Orchestrates one dedicated render thread's per-block work (spec §4.J,
/// §5). Every field here is exclusively owned and mutated by whichever
/// thread calls [`Engine::render_block`]; cross-thread inputs (scene
/// mutation, emitter params, listener pose) arrive only through the
/// double-buffered structures handed out in [`EngineHandles`].
pub struct Engine {
    config: EngineConfig,
    channels: usize,
    frames: usize,

    event_consumer: EventConsumer,
    snapshot_mgr: Arc<WorldSnapshotManager>,
    voice_mgr: EmitterVoiceManager,

    sfx_bus: AudioBus,
    reverb_bus: AudioBus,
    master_bus: AudioBus,
    mix_snapshot: MixSnapshotManager,

    sink: Box<dyn AudioSink>,

    dry_accum: Vec<Sample>,
    reverb_accum: Vec<Sample>,
    master_out: Vec<Sample>,
    event_scratch: Vec<TopologyEvent>,
    completed_scratch: Vec<VoiceHandle>,

    counters: RenderCounters,
    last_block_duration_ns: u64,
    block_counter: u64,
}

impl Engine {
    /// Builds the full engine: event ring, double-buffered snapshot, voice
    /// manager (which allocates and `prepare`s the entire voice pool —
    /// this is the last allocation point), and the fixed SFX/Reverb/Master
    /// bus graph. Opens `sink` at the configured rate/channels/block size.
    pub fn new(
        config: EngineConfig,
        mut sink: Box<dyn AudioSink>,
        ray_backend: Option<Arc<dyn RayBackend>>,
    ) -> Result<(Self, EngineHandles), EngineError> {
        let (event_producer, event_consumer) = event_ring(config.event_ring_capacity())?;

        let snapshot_mgr = Arc::new(WorldSnapshotManager::new());
        if let Some(backend) = ray_backend {
            snapshot_mgr.set_ray_backend(backend);
        }
        snapshot_mgr.publish();

        let voice_mgr = EmitterVoiceManager::try_new(
            config.physical_budget(),
            config.critical_reserve(),
            config.block_size(),
            config.channels(),
        )?;
        let listener = voice_mgr.listener().clone();

        sink.open(config.sample_rate(), config.channels(), config.block_size())?;

        let channels = config.channels();
        let frames = config.block_size();
        let n = frames * channels;

        let mut sfx_bus = AudioBus::new(SFX_BUS_NAME);
        let mut reverb_bus = AudioBus::new(REVERB_BUS_NAME);
        let mut master_bus = AudioBus::new(MASTER_BUS_NAME);
        sfx_bus.prepare(frames, channels);
        reverb_bus.prepare(frames, channels);
        master_bus.prepare(frames, channels);

        let handles = EngineHandles {
            event_producer,
            snapshot: snapshot_mgr.clone(),
            listener,
        };

        // The ring can never hold more pending events than its own capacity,
        // so a scratch buffer of that size bounds every possible drain.
        let event_scratch = vec![TopologyEvent::default(); config.event_ring_capacity()];
        let completed_scratch = Vec::with_capacity(config.physical_budget());

        let engine = Self {
            config,
            channels,
            frames,
            event_consumer,
            snapshot_mgr,
            voice_mgr,
            sfx_bus,
            reverb_bus,
            master_bus,
            mix_snapshot: MixSnapshotManager::new(),
            sink,
            dry_accum: vec![0.0; n],
            reverb_accum: vec![0.0; n],
            master_out: vec![0.0; n],
            event_scratch,
            completed_scratch,
            counters: RenderCounters::default(),
            last_block_duration_ns: 0,
            block_counter: 0,
        };
        Ok((engine, handles))
    }

    pub fn spawn_emitter(&mut self, importance: EmitterImportance) -> EmitterId {
        self.voice_mgr.spawn_emitter(importance)
    }

    pub fn destroy_emitter(&mut self, id: EmitterId) {
        self.voice_mgr.destroy_emitter(id);
    }

    pub fn emitter(&self, id: EmitterId) -> Option<&Arc<Emitter>> {
        self.voice_mgr.emitter(id)
    }

    pub fn voice_manager(&self) -> &EmitterVoiceManager {
        &self.voice_mgr
    }

    pub fn voice_manager_mut(&mut self) -> &mut EmitterVoiceManager {
        &mut self.voice_mgr
    }

    pub fn snapshot_manager(&self) -> &Arc<WorldSnapshotManager> {
        &self.snapshot_mgr
    }

    pub fn sfx_bus_mut(&mut self) -> &mut AudioBus {
        &mut self.sfx_bus
    }

    pub fn reverb_bus_mut(&mut self) -> &mut AudioBus {
        &mut self.reverb_bus
    }

    pub fn master_bus_mut(&mut self) -> &mut AudioBus {
        &mut self.master_bus
    }

    pub fn activate_mix_snapshot(&mut self, request: MixSnapshotRequest) {
        let sfx_gain = self.sfx_bus.gain();
        let reverb_gain = self.reverb_bus.gain();
        let master_gain = self.master_bus.gain();
        self.mix_snapshot.activate(request, |name| match name {
            SFX_BUS_NAME => Some(sfx_gain),
            REVERB_BUS_NAME => Some(reverb_gain),
            MASTER_BUS_NAME => Some(master_gain),
            _ => None,
        });
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            blocks_rendered: self.counters.blocks_rendered(),
            last_block_duration_ns: self.last_block_duration_ns,
            node_failures: self.counters.node_failures(),
            events: self.event_consumer.stats(),
            voices: self.voice_mgr.stats(),
        }
    }

    /// Runs exactly one render block (spec §4.J, numbered as in the spec):
    /// 1. advance the mix-snapshot blend; 2. drain the event ring and
    /// mutate the back buffer; 3. acquire the front snapshot; 4. render
    /// every bound voice into the dry/reverb accumulators; 5. submit those
    /// into the SFX/Reverb buses; 6. drain completed one-shots; 7. process
    /// the master bus from silence; 8. write to the sink; 9. bookkeeping.
    /// Never panics out to the caller: node or sink failures are contained,
    /// counted, and logged, and the block still makes forward progress
    /// (spec §7, §4.J "failure semantics").
    pub fn render_block(&mut self) {
        let block_start = Instant::now();
        let frames = self.frames;
        let channels = self.channels;
        let n = frames * channels;
        let block_duration_s = self.config.block_duration_seconds();

        // 1. Mix-snapshot blend.
        let sfx_bus = &mut self.sfx_bus;
        let reverb_bus = &mut self.reverb_bus;
        let master_bus = &mut self.master_bus;
        self.mix_snapshot.advance_block(block_duration_s, |name, gain| match name {
            SFX_BUS_NAME => sfx_bus.set_gain(gain),
            REVERB_BUS_NAME => reverb_bus.set_gain(gain),
            MASTER_BUS_NAME => master_bus.set_gain(gain),
            _ => {}
        });

        // 2. Drain the event ring onto the snapshot's back buffer.
        let drained = self.event_consumer.drain(&mut self.event_scratch);
        let mut mutated = false;
        if drained > 0 {
            let lookup = self.snapshot_mgr.acquire();
            for event in &self.event_scratch[..drained] {
                match *event {
                    TopologyEvent::PortalStateChanged { portal_id, aperture, .. } => {
                        self.snapshot_mgr.set_portal_aperture(portal_id, aperture);
                        mutated = true;
                    }
                    TopologyEvent::GeometryDestroyed { .. } => {
                        self.snapshot_mgr.clear_portal_aperture_overrides();
                        mutated = true;
                    }
                    TopologyEvent::MaterialOverrideChanged {
                        entity_id,
                        new_material_id,
                        ..
                    } => {
                        if let Some(template) = lookup.material(new_material_id) {
                            if let Ok(remapped) = Material::try_new(
                                entity_id,
                                *template.absorption(),
                                *template.scattering(),
                                *template.transmission_loss_db(),
                            ) {
                                self.snapshot_mgr.put_material(remapped);
                                mutated = true;
                            }
                        }
                    }
                }
            }
        }
        if mutated {
            self.snapshot_mgr.publish();
        }

        // 3. Acquire the front snapshot for this block. Dropped at the end
        // of this scope; nothing below may let it escape the block.
        let _snapshot = self.snapshot_mgr.acquire();

        // Dual-pool budget re-evaluation: the pool is render-thread owned
        // (spec §3), so promotion/demotion happen here rather than on an
        // emitter worker thread, at the same cadence as score updates.
        self.block_counter += 1;
        if self.block_counter % SCORE_UPDATE_BLOCKS as u64 == 0 {
            self.voice_mgr.evaluate_budget(None);
        }

        // 4. Per-voice render into the dry/reverb accumulators.
        self.dry_accum[..n].fill(0.0);
        self.reverb_accum[..n].fill(0.0);
        let dry_accum = &mut self.dry_accum;
        let reverb_accum = &mut self.reverb_accum;
        let counters = &self.counters;
        for (_, voice) in self.voice_mgr.pool_mut().iter_active_mut() {
            if !voice.is_bound() {
                continue;
            }
            voice.update_from_emitter();
            let rendered = panic::catch_unwind(AssertUnwindSafe(|| voice.render(frames)));
            match rendered {
                Ok(Some((dry, wet))) => {
                    for i in 0..n {
                        dry_accum[i] += dry[i];
                        reverb_accum[i] += wet[i];
                    }
                }
                Ok(None) => {}
                Err(_) => {
                    counters.record_node_failure();
                    log::error!("dynamis-mixer: voice chain panicked, dropping its contribution for this block");
                }
            }
        }

        // 5. Submit accumulators into their buses.
        self.sfx_bus.submit_block(&self.dry_accum[..n], frames, channels);
        self.reverb_bus.submit_block(&self.reverb_accum[..n], frames, channels);

        // 6. Completion drain: collect handles first, the pool borrow must
        // end before we can call back into the voice manager to demote.
        // Reuses a pre-sized scratch buffer so this never allocates.
        self.completed_scratch.clear();
        for (handle, voice) in self.voice_mgr.pool_mut().iter_active_mut() {
            if voice.completion_pending() {
                self.completed_scratch.push(handle);
            }
        }
        for i in 0..self.completed_scratch.len() {
            let handle = self.completed_scratch[i];
            self.voice_mgr.demote_by_voice_handle(handle);
        }

        // 7. Process SFX/Reverb into master's submitted inlet, then the
        // master bus itself from silence (its own sources, if any, sum in
        // too — see `AudioBus::render_into`).
        {
            let sfx_bus = &mut self.sfx_bus;
            let sfx_out = &mut self.dry_accum;
            let sfx_result =
                panic::catch_unwind(AssertUnwindSafe(|| sfx_bus.render_from_silence(&mut sfx_out[..n], frames, channels)));
            if sfx_result.is_err() {
                self.counters.record_node_failure();
                log::error!("dynamis-mixer: SFX bus panicked, substituting silence for this block");
                self.dry_accum[..n].fill(0.0);
            }
        }

        {
            let reverb_bus = &mut self.reverb_bus;
            let reverb_out = &mut self.reverb_accum;
            let reverb_result = panic::catch_unwind(AssertUnwindSafe(|| {
                reverb_bus.render_from_silence(&mut reverb_out[..n], frames, channels)
            }));
            if reverb_result.is_err() {
                self.counters.record_node_failure();
                log::error!("dynamis-mixer: Reverb bus panicked, substituting silence for this block");
                self.reverb_accum[..n].fill(0.0);
            }
        }

        self.master_bus.submit_block(&self.dry_accum[..n], frames, channels);
        self.master_bus.submit_block(&self.reverb_accum[..n], frames, channels);

        {
            let master_bus = &mut self.master_bus;
            let master_out = &mut self.master_out;
            let master_result = panic::catch_unwind(AssertUnwindSafe(|| {
                master_bus.render_from_silence(&mut master_out[..n], frames, channels)
            }));
            if master_result.is_err() {
                self.counters.record_node_failure();
                log::error!("dynamis-mixer: master bus panicked, substituting silence for this block");
                self.master_out[..n].fill(0.0);
            }
        }

        // 8. Write to the sink. Device failure is reported, never fatal.
        if let Err(err) = self.sink.write(&self.master_out[..n], frames, channels) {
            self.counters.record_node_failure();
            log::error!("dynamis-mixer: sink write failed: {err}");
        }

        // 9. Bookkeeping.
        self.counters.record_block();
        self.last_block_duration_ns = block_start.elapsed().as_nanos() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullAudioSink;

    fn test_config() -> EngineConfig {
        EngineConfig::builder()
            .with_channels(1)
            .with_block_size(64)
            .with_physical_budget(4)
            .with_critical_reserve(1)
            .with_event_ring_capacity(16)
            .build()
            .unwrap()
    }

    #[test]
    fn render_block_writes_finite_silence_with_no_emitters() {
        let (mut engine, _handles) = Engine::new(test_config(), Box::new(NullAudioSink::new()), None).unwrap();
        for _ in 0..8 {
            engine.render_block();
        }
        assert_eq!(engine.stats().blocks_rendered, 8);
        assert_eq!(engine.stats().node_failures, 0);
    }

    #[test]
    fn mix_snapshot_scenario_master_gain_converges_immediately() {
        let (mut engine, _handles) = Engine::new(test_config(), Box::new(NullAudioSink::new()), None).unwrap();
        assert!((engine.master_bus_mut().gain() - 1.0).abs() < 1e-6);
        engine.activate_mix_snapshot(MixSnapshotRequest {
            targets: vec![(MASTER_BUS_NAME.to_string(), 0.3)],
            blend_time_seconds: 0.0,
        });
        engine.render_block();
        assert!((engine.master_bus_mut().gain() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn spawned_emitter_is_visible_through_the_engine() {
        let (mut engine, _handles) = Engine::new(test_config(), Box::new(NullAudioSink::new()), None).unwrap();
        let id = engine.spawn_emitter(EmitterImportance::Normal);
        assert!(engine.emitter(id).is_some());
        engine.destroy_emitter(id);
        assert_eq!(
            engine.emitter(id).unwrap().state(),
            dynamis_core::EmitterState::Release
        );
    }
}
