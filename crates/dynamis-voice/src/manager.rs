//! Emitter & voice manager: emitter lifecycle, the dual-pool budget
//! evaluation, and priority-driven promotion/demotion between virtual
//! tracking and physical voices (spec §4.F).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dynamis_core::{
    CoreError, CoreResult, EmitterImportance, EmitterState, DEMOTE_THRESHOLD,
    MAX_CRITICAL_RESERVE_FRACTION, PROMOTE_THRESHOLD,
};
use dynamis_dsp::{VoiceHandle, VoicePool};
use dynamis_world::WorldSnapshot;

use crate::emitter::Emitter;
use crate::listener::ListenerPose;
use crate::score::{compare_candidates, PriorityCandidate};

/// Opaque identifier handed back by [`EmitterVoiceManager::spawn_emitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmitterId(u64);

impl EmitterId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Operator-facing saturation counters (spec §7: runtime saturation is
/// non-fatal, counted, and logged once per class).
#[derive(Default)]
struct ManagerCounters {
    promotions: AtomicU64,
    demotions: AtomicU64,
    pool_exhaustions: AtomicU64,
    trimmed_candidates: AtomicU64,
}

/// Point-in-time snapshot of [`ManagerCounters`] for a host to surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceManagerStats {
    pub promotions: u64,
    pub demotions: u64,
    pub pool_exhaustions: u64,
    pub trimmed_candidates: u64,
}

/// Emitter lifecycle registry, priority scoring driver, and dual-pool
/// promotion/demotion budget evaluator. CRITICAL emitters compete only for
/// `critical_reserve` physical slots; every other importance competes for
/// the remaining `physical_budget - critical_reserve` (spec §4.F).
pub struct EmitterVoiceManager {
    emitters: Vec<Arc<Emitter>>,
    next_id: u64,
    pool: VoicePool,
    physical_budget: usize,
    critical_reserve: usize,
    listener: Arc<ListenerPose>,
    counters: ManagerCounters,
}

impl EmitterVoiceManager {
    /// Validates the dual-pool contract at construction (spec §7: contract
    /// violations are fatal at construction, never silently corrected).
    pub fn try_new(physical_budget: usize, critical_reserve: usize, max_frames: usize, channels: usize) -> CoreResult<Self> {
        if physical_budget == 0 {
            return Err(CoreError::ZeroPhysicalBudget(physical_budget));
        }
        let max_reserve = physical_budget as f64 * MAX_CRITICAL_RESERVE_FRACTION;
        if critical_reserve as f64 > max_reserve {
            return Err(CoreError::CriticalReserveTooLarge {
                reserve: critical_reserve,
                budget: physical_budget,
            });
        }
        Ok(Self {
            emitters: Vec::new(),
            next_id: 1,
            pool: VoicePool::new(physical_budget, max_frames, channels),
            physical_budget,
            critical_reserve,
            listener: Arc::new(ListenerPose::new()),
            counters: ManagerCounters::default(),
        })
    }

    pub fn listener(&self) -> &Arc<ListenerPose> {
        &self.listener
    }

    pub fn pool_mut(&mut self) -> &mut VoicePool {
        &mut self.pool
    }

    pub fn emitters(&self) -> &[Arc<Emitter>] {
        &self.emitters
    }

    pub fn emitter(&self, id: EmitterId) -> Option<&Arc<Emitter>> {
        self.emitters.iter().find(|e| e.id() == id.0)
    }

    /// Creates a new logical emitter, transitioning it `Spawning ->
    /// Virtual` immediately (spec §3: "SPAWNING -> VIRTUAL after
    /// initialization" — there is no further async init step in this
    /// engine).
    pub fn spawn_emitter(&mut self, importance: EmitterImportance) -> EmitterId {
        let id = self.next_id;
        self.next_id += 1;
        let emitter = Arc::new(Emitter::new(id, importance));
        emitter.set_state(EmitterState::Virtual);
        self.emitters.push(emitter);
        EmitterId(id)
    }

    /// Transitions an emitter to `Release`; its worker drains on its next
    /// park cycle (spec §5).
    pub fn destroy_emitter(&mut self, id: EmitterId) {
        if let Some(e) = self.emitter(id) {
            e.set_state(EmitterState::Release);
        }
    }

    /// Runs every active emitter's per-interval duties against the given
    /// snapshot. Exposed directly (in addition to [`crate::worker`]'s
    /// thread-based runner) so a host or test can drive updates
    /// deterministically on its own schedule.
    pub fn update_scores(&self, snapshot: &WorldSnapshot) {
        for e in &self.emitters {
            if e.state() != EmitterState::Inactive {
                e.run_score_update(snapshot, &self.listener);
            }
        }
    }

    /// Dual-pool budget evaluation (spec §4.F): demotes out-of-budget or
    /// sub-threshold physical emitters, then promotes the highest-scoring
    /// eligible virtual emitters up to capacity. `voice_pool_capacity_hint`
    /// may further trim promotions this cycle; trimmed candidates are
    /// counted and logged, not dropped as emitters.
    pub fn evaluate_budget(&mut self, voice_pool_capacity_hint: Option<usize>) {
        let critical_reserve = self.critical_reserve;
        let normal_budget = self.physical_budget - self.critical_reserve;
        self.evaluate_pool(
            |imp| imp == EmitterImportance::Critical,
            critical_reserve,
            voice_pool_capacity_hint,
        );
        self.evaluate_pool(
            |imp| imp != EmitterImportance::Critical,
            normal_budget,
            voice_pool_capacity_hint,
        );
    }

    fn evaluate_pool(
        &mut self,
        in_pool: impl Fn(EmitterImportance) -> bool,
        capacity: usize,
        hint: Option<usize>,
    ) {
        struct Entry {
            idx: usize,
            candidate: PriorityCandidate,
        }

        let mut entries: Vec<Entry> = self
            .emitters
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                in_pool(e.importance())
                    && matches!(e.state(), EmitterState::Virtual | EmitterState::Physical)
            })
            .map(|(idx, e)| Entry {
                idx,
                candidate: PriorityCandidate {
                    emitter_id: e.id(),
                    importance: e.importance(),
                    score: e.score(),
                },
            })
            .collect();
        entries.sort_by(|a, b| compare_candidates(&a.candidate, &b.candidate));

        for (rank, entry) in entries.iter().enumerate() {
            let e = &self.emitters[entry.idx];
            if e.state() != EmitterState::Physical {
                continue;
            }
            let over_capacity = rank >= capacity;
            let below_threshold = e.score() < DEMOTE_THRESHOLD;
            if over_capacity || below_threshold {
                self.demote(entry.idx);
            }
        }

        let promote_limit = hint.unwrap_or(usize::MAX);
        let mut promoted_this_cycle = 0usize;
        for entry in &entries {
            if self.pool_physical_count(&in_pool) >= capacity {
                break;
            }
            let e = self.emitters[entry.idx].clone();
            if e.state() != EmitterState::Virtual || e.score() < PROMOTE_THRESHOLD {
                continue;
            }
            if promoted_this_cycle >= promote_limit {
                self.counters.trimmed_candidates.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "voice-pool capacity hint deferred promotion of emitter {}",
                    e.id()
                );
                continue;
            }
            if self.promote(entry.idx) {
                promoted_this_cycle += 1;
            } else {
                self.counters.pool_exhaustions.fetch_add(1, Ordering::Relaxed);
                log::warn!("voice pool exhausted; candidate promotions deferred");
                break;
            }
        }
    }

    fn pool_physical_count(&self, in_pool: &impl Fn(EmitterImportance) -> bool) -> usize {
        self.emitters
            .iter()
            .filter(|e| in_pool(e.importance()) && e.state() == EmitterState::Physical)
            .count()
    }

    fn promote(&mut self, idx: usize) -> bool {
        let e = self.emitters[idx].clone();
        let Some((handle, voice)) = self.pool.acquire() else {
            return false;
        };
        voice.set_emitter(Some(e.params_handle()));
        if let Some(asset) = e.take_pending_asset() {
            voice.set_asset(Some(asset));
        }
        e.install_reflection_sink(Box::new(voice.early_reflections_mut().sink_handle()));
        e.set_voice_slot(Some(handle));
        e.set_state(EmitterState::Physical);
        self.counters.promotions.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn demote(&mut self, idx: usize) {
        let e = self.emitters[idx].clone();
        if let Some(handle) = e.voice_slot() {
            self.pool.get_mut(handle).early_reflections_mut().clear_sink();
            self.pool.release(handle);
        }
        e.clear_reflection_sink();
        e.set_voice_slot(None);
        e.set_state(EmitterState::Virtual);
        self.counters.demotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Called from the mixer's completion drain (spec §4.J step 6): looks
    /// up which emitter owns `handle` and demotes it.
    pub fn demote_by_voice_handle(&mut self, handle: VoiceHandle) {
        if let Some(idx) = self
            .emitters
            .iter()
            .position(|e| e.voice_slot() == Some(handle))
        {
            self.demote(idx);
        }
    }

    pub fn stats(&self) -> VoiceManagerStats {
        VoiceManagerStats {
            promotions: self.counters.promotions.load(Ordering::Relaxed),
            demotions: self.counters.demotions.load(Ordering::Relaxed),
            pool_exhaustions: self.counters.pool_exhaustions.load(Ordering::Relaxed),
            trimmed_candidates: self.counters.trimmed_candidates.load(Ordering::Relaxed),
        }
    }
}
