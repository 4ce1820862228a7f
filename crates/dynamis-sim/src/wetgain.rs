//! Wet-gain calculator: critical-distance based reverb send level
//! (spec §4.E).

use dynamis_core::SPEED_OF_SOUND;

/// RT60 floor to avoid divide-by-zero in the critical-distance formula;
/// independent of (and tighter than) `MIN_RT60_SECONDS` since this guards
/// arithmetic rather than acoustic plausibility.
const RT60_EPSILON_SECONDS: f64 = 0.001;

/// Critical distance `D_c = sqrt(V / (4*pi*RT60*c))`.
pub fn critical_distance(volume: f64, rt60_seconds: f64) -> f64 {
    let rt60 = rt60_seconds.max(RT60_EPSILON_SECONDS);
    let volume = volume.max(0.0);
    (volume / (4.0 * std::f64::consts::PI * rt60 * SPEED_OF_SOUND)).sqrt()
}

/// Wet gain = `clamp(1 - exp(-distance/D_c), 0, 1)`. Zero distance yields 0;
/// distance far beyond `D_c` approaches 1; at `distance == D_c` it is
/// `1 - e^-1 ≈ 0.632`.
pub fn wet_gain(distance: f64, volume: f64, rt60_seconds: f64) -> f64 {
    let d_c = critical_distance(volume, rt60_seconds);
    if d_c <= 0.0 {
        return 1.0;
    }
    (1.0 - (-distance.max(0.0) / d_c).exp()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_distance_is_zero() {
        assert_relative_eq!(wet_gain(0.0, 100.0, 1.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn at_critical_distance_is_point_632() {
        let d_c = critical_distance(100.0, 1.0);
        assert_relative_eq!(wet_gain(d_c, 100.0, 1.0), 1.0 - std::f64::consts::E.recip(), epsilon = 1e-9);
    }

    #[test]
    fn far_distance_approaches_one() {
        let d_c = critical_distance(100.0, 1.0);
        assert!(wet_gain(d_c * 50.0, 100.0, 1.0) > 0.999);
    }

    #[test]
    fn always_within_unit_interval() {
        for distance in [0.0, 1.0, 5.0, 1000.0] {
            for volume in [0.0, 10.0, 10_000.0] {
                for rt60 in [0.0, 0.01, 30.0] {
                    let g = wet_gain(distance, volume, rt60);
                    assert!((0.0..=1.0).contains(&g), "gain {g} out of range");
                }
            }
        }
    }
}
