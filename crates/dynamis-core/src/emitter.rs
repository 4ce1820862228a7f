//! Emitter lifecycle state and the plain per-block parameter snapshot a
//! voice reads (spec §3, §4.F). Lives in this crate rather than
//! `dynamis-voice` because both the voice manager and the DSP voice chain
//! need it, and `dynamis-voice` depends on `dynamis-dsp` — putting it here
//! avoids a cycle.

use crate::BandArray;

/// Lifecycle state of a logical emitter. Sole permitted transitions:
/// `Inactive -> Spawning` on trigger, `Spawning -> Virtual` after
/// initialization, `Virtual <-> Physical` via manager promotion/demotion,
/// any state `-> Release` on destroy, `Release -> Inactive` after tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmitterState {
    Inactive,
    Spawning,
    Virtual,
    Physical,
    Release,
}

impl EmitterState {
    /// True if `self -> next` is one of the sole permitted transitions.
    pub fn can_transition_to(self, next: EmitterState) -> bool {
        use EmitterState::*;
        match (self, next) {
            (Inactive, Spawning) => true,
            (Spawning, Virtual) => true,
            (Virtual, Physical) | (Physical, Virtual) => true,
            (_, Release) => true,
            (Release, Inactive) => true,
            _ => false,
        }
    }
}

/// Ordered emitter priority class. `Critical` emitters compete only within
/// a reserved pool; ordinal order drives both the priority-score penalty
/// and the comparator's tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EmitterImportance {
    Critical,
    High,
    Normal,
    Low,
}

impl EmitterImportance {
    /// 0-based ordinal, `Critical = 0` through `Low = 3`.
    pub fn ordinal(self) -> u8 {
        match self {
            EmitterImportance::Critical => 0,
            EmitterImportance::High => 1,
            EmitterImportance::Normal => 2,
            EmitterImportance::Low => 3,
        }
    }
}

/// Plain, primitive-only snapshot a voice reads once per block. No inner
/// references, so it's `Copy` and safe to read through a double-buffered
/// front index without chasing pointers (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterParams {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub occlusion_per_band: BandArray,
    /// `0` means "no room" (e.g. exterior / unknown).
    pub room_id: u32,
    pub reverb_wet_gain: f64,
    pub master_gain: f32,
    pub pitch: f32,
    pub playback_position_frames: u64,
    pub loop_enabled: bool,
    /// Opaque handle into the host's PCM asset table.
    pub pcm_buffer_handle: u64,
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

impl Default for EmitterParams {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            velocity: [0.0; 3],
            occlusion_per_band: crate::ZERO_BANDS,
            room_id: 0,
            reverb_wet_gain: 0.0,
            master_gain: 1.0,
            pitch: 1.0,
            playback_position_frames: 0,
            loop_enabled: false,
            pcm_buffer_handle: 0,
            azimuth: 0.0,
            elevation: 0.0,
            distance: 0.0,
        }
    }
}

/// Narrow capability a voice uses to pull the current per-block parameter
/// snapshot from whatever owns the emitter's double buffer, without the
/// voice chain depending on the emitter/voice-manager crate (spec §3, §9:
/// "the render thread reads only through the `EmitterParams` front
/// buffer").
pub trait EmitterParamsSource: Send + Sync {
    fn params(&self) -> EmitterParams;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_to_spawning_is_legal() {
        assert!(EmitterState::Inactive.can_transition_to(EmitterState::Spawning));
    }

    #[test]
    fn virtual_and_physical_transition_both_ways() {
        assert!(EmitterState::Virtual.can_transition_to(EmitterState::Physical));
        assert!(EmitterState::Physical.can_transition_to(EmitterState::Virtual));
    }

    #[test]
    fn any_state_can_release() {
        for s in [
            EmitterState::Inactive,
            EmitterState::Spawning,
            EmitterState::Virtual,
            EmitterState::Physical,
        ] {
            assert!(s.can_transition_to(EmitterState::Release));
        }
    }

    #[test]
    fn inactive_cannot_jump_to_virtual() {
        assert!(!EmitterState::Inactive.can_transition_to(EmitterState::Virtual));
    }

    #[test]
    fn importance_ordinal_is_ordered() {
        assert!(EmitterImportance::Critical.ordinal() < EmitterImportance::High.ordinal());
        assert!(EmitterImportance::High.ordinal() < EmitterImportance::Normal.ordinal());
        assert!(EmitterImportance::Normal.ordinal() < EmitterImportance::Low.ordinal());
    }

    #[test]
    fn default_params_are_silent_and_unity_gain() {
        let p = EmitterParams::default();
        assert_eq!(p.master_gain, 1.0);
        assert_eq!(p.room_id, 0);
        assert_eq!(p.occlusion_per_band, crate::ZERO_BANDS);
    }
}
