//! Priority scoring and the stable total-order comparator that drives
//! virtual/physical promotion and demotion (spec §4.F).

use std::cmp::Ordering;

use dynamis_core::{
    EmitterImportance, SCORE_EPSILON, W_AUDIBILITY, W_DISTANCE, W_IMPORTANCE, W_OCCLUSION_PENALTY,
    W_VELOCITY,
};

/// Inputs to the per-interval priority score (spec §4.F).
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub distance: f64,
    pub master_gain: f32,
    pub velocity_magnitude: f64,
    pub importance: EmitterImportance,
    pub mean_occlusion: f64,
}

/// `score = max(0, raw - mean_occlusion * W_OCCLUSION_PENALTY)` where `raw`
/// is the weighted sum of distance/importance/audibility/velocity factors.
pub fn priority_score(inputs: &ScoreInputs) -> f64 {
    let dist_factor = 1.0 / (1.0 + inputs.distance * inputs.distance * 0.01);
    let audibility = inputs.master_gain as f64;
    let vel_factor = (inputs.velocity_magnitude / 50.0).min(1.0);
    let importance_f = 1.0 - inputs.importance.ordinal() as f64 * 0.25;

    let raw = W_DISTANCE * dist_factor
        + W_IMPORTANCE * importance_f
        + W_AUDIBILITY * audibility
        + W_VELOCITY * vel_factor;

    (raw - inputs.mean_occlusion * W_OCCLUSION_PENALTY).max(0.0)
}

/// What the comparator orders on: a computed score plus the two tie-break
/// fields (spec §4.F comparator).
#[derive(Debug, Clone, Copy)]
pub struct PriorityCandidate {
    pub emitter_id: u64,
    pub importance: EmitterImportance,
    pub score: f64,
}

/// Stable, total order: higher score first (difference > `SCORE_EPSILON`),
/// then lower importance ordinal, then lower emitter id (oldest wins).
/// Mandatory for deterministic budget evaluation and replay (spec §4.F,
/// §8 invariant 2).
pub fn compare_candidates(a: &PriorityCandidate, b: &PriorityCandidate) -> Ordering {
    let diff = a.score - b.score;
    if diff.abs() > SCORE_EPSILON {
        return b
            .score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal);
    }
    match a.importance.ordinal().cmp(&b.importance.ordinal()) {
        Ordering::Equal => a.emitter_id.cmp(&b.emitter_id),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(id: u64, importance: EmitterImportance, score: f64) -> PriorityCandidate {
        PriorityCandidate {
            emitter_id: id,
            importance,
            score,
        }
    }

    #[test]
    fn higher_score_wins() {
        let a = candidate(1, EmitterImportance::Normal, 0.9);
        let b = candidate(2, EmitterImportance::Normal, 0.1);
        assert_eq!(compare_candidates(&a, &b), Ordering::Less);
    }

    #[test]
    fn tied_score_breaks_on_importance_then_id() {
        let a = candidate(5, EmitterImportance::High, 0.5);
        let b = candidate(1, EmitterImportance::Normal, 0.5);
        assert_eq!(compare_candidates(&a, &b), Ordering::Less);

        let c = candidate(10, EmitterImportance::Normal, 0.5);
        let d = candidate(2, EmitterImportance::Normal, 0.5);
        assert_eq!(compare_candidates(&c, &d), Ordering::Greater);
    }

    #[test]
    fn comparator_is_antisymmetric_and_transitive_on_a_sample_set() {
        let set = [
            candidate(1, EmitterImportance::Critical, 0.4),
            candidate(2, EmitterImportance::Low, 0.4),
            candidate(3, EmitterImportance::Normal, 0.9),
            candidate(4, EmitterImportance::Normal, 0.9),
        ];
        for a in &set {
            for b in &set {
                assert_eq!(
                    compare_candidates(a, b).reverse(),
                    compare_candidates(b, a)
                );
            }
        }
    }

    #[test]
    fn zero_distance_and_full_gain_gives_high_score() {
        let s = priority_score(&ScoreInputs {
            distance: 0.0,
            master_gain: 1.0,
            velocity_magnitude: 0.0,
            importance: EmitterImportance::Critical,
            mean_occlusion: 0.0,
        });
        assert_relative_eq!(s, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn full_occlusion_can_zero_the_score() {
        let s = priority_score(&ScoreInputs {
            distance: 10_000.0,
            master_gain: 0.0,
            velocity_magnitude: 0.0,
            importance: EmitterImportance::Low,
            mean_occlusion: 1.0,
        });
        assert!(s >= 0.0);
    }
}
