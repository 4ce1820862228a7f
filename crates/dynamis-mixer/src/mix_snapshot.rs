//! Mix-snapshot blend layer (spec §4.J step 1, §8 scenario 6, §9): a
//! designer-authored set of target bus gains, activated with a blend
//! time, advanced one block at a time against whatever currently exposes
//! [`MixBusControl`] — this module never names a concrete bus type.

/// One activation request: target gain per bus name, plus how long the
/// blend should take. `blend_time_seconds == 0.0` snaps immediately.
#[derive(Debug, Clone)]
pub struct MixSnapshotRequest {
    pub targets: Vec<(String, f32)>,
    pub blend_time_seconds: f64,
}

struct BlendEntry {
    name: String,
    start_gain: f32,
    target_gain: f32,
}

/// Drives a linear blend from each target bus's current gain toward its
/// snapshot target over `blend_time_seconds`, one render block at a time.
#[derive(Default)]
pub struct MixSnapshotManager {
    active: Vec<BlendEntry>,
    blend_duration_s: f64,
    blend_elapsed_s: f64,
}

impl MixSnapshotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blending(&self) -> bool {
        !self.active.is_empty()
    }

    /// Activates a new snapshot. `current_gain` resolves each target bus's
    /// starting gain (the mixer passes a closure that looks the bus up by
    /// name in its own graph); a bus absent from the graph is silently
    /// skipped, matching the "unknown -> default" scene-absence policy
    /// (spec §7).
    pub fn activate(&mut self, request: MixSnapshotRequest, mut current_gain: impl FnMut(&str) -> Option<f32>) {
        self.active = request
            .targets
            .into_iter()
            .filter_map(|(name, target_gain)| {
                let start_gain = current_gain(&name)?;
                Some(BlendEntry {
                    name,
                    start_gain,
                    target_gain,
                })
            })
            .collect();
        self.blend_duration_s = request.blend_time_seconds.max(0.0);
        self.blend_elapsed_s = 0.0;
    }

    /// Advances the active blend by one block's worth of wall-clock time,
    /// invoking `apply(name, gain)` for every bus still blending. Clears
    /// itself once every target has reached `t >= 1.0`.
    pub fn advance_block(&mut self, block_duration_s: f64, mut apply: impl FnMut(&str, f32)) {
        if self.active.is_empty() {
            return;
        }
        self.blend_elapsed_s += block_duration_s;
        let t = if self.blend_duration_s <= 0.0 {
            1.0
        } else {
            (self.blend_elapsed_s / self.blend_duration_s).clamp(0.0, 1.0)
        } as f32;
        for entry in &self.active {
            let gain = entry.start_gain + (entry.target_gain - entry.start_gain) * t;
            apply(&entry.name, gain);
        }
        if t >= 1.0 {
            self.active.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn zero_blend_time_snaps_on_first_block() {
        let mut mgr = MixSnapshotManager::new();
        mgr.activate(
            MixSnapshotRequest {
                targets: vec![("Master".into(), 0.3)],
                blend_time_seconds: 0.0,
            },
            |_| Some(1.0),
        );
        let mut gains = HashMap::new();
        mgr.advance_block(256.0 / 48_000.0, |name, gain| {
            gains.insert(name.to_string(), gain);
        });
        assert!((gains["Master"] - 0.3).abs() < 1e-6);
        assert!(!mgr.is_blending());
    }

    #[test]
    fn nonzero_blend_time_interpolates_over_several_blocks() {
        let mut mgr = MixSnapshotManager::new();
        mgr.activate(
            MixSnapshotRequest {
                targets: vec![("Master".into(), 0.0)],
                blend_time_seconds: 1.0,
            },
            |_| Some(1.0),
        );
        let block_s = 256.0 / 48_000.0;
        let mut last_gain = 1.0;
        let mut saw_progress = false;
        for _ in 0..200 {
            mgr.advance_block(block_s, |_, gain| {
                saw_progress |= gain < last_gain;
                last_gain = gain;
            });
        }
        assert!(saw_progress);
        assert!((last_gain - 0.0).abs() < 1e-3);
        assert!(!mgr.is_blending());
    }

    #[test]
    fn unknown_bus_name_is_skipped_not_an_error() {
        let mut mgr = MixSnapshotManager::new();
        mgr.activate(
            MixSnapshotRequest {
                targets: vec![("Ghost".into(), 0.5)],
                blend_time_seconds: 0.0,
            },
            |_| None,
        );
        assert!(!mgr.is_blending());
    }
}
