//! RT60 estimator: Sabine below the Eyring threshold, Eyring above it
//! (spec §4.E).

use dynamis_core::{BandArray, BAND_COUNT, EYRING_THRESHOLD, MAX_RT60_SECONDS, MIN_RT60_SECONDS, SABINE_CONSTANT};

/// Estimates per-band RT60 for a room given its volume, surface area and
/// per-band absorption in sabins (`S*alpha`). Selects Eyring when the mean
/// absorption coefficient exceeds [`EYRING_THRESHOLD`], Sabine otherwise.
/// Every output band is clamped to `[MIN_RT60_SECONDS, MAX_RT60_SECONDS]`;
/// a zero-volume room floors to the minimum on every band, zero absorption
/// ceilings to the maximum.
pub fn estimate_rt60(volume: f64, surface_area: f64, sabins: &BandArray) -> BandArray {
    let volume = volume.max(0.0);
    let surface_area = surface_area.max(1.0);
    let mean_alpha = (sabins.iter().sum::<f64>() / BAND_COUNT as f64) / surface_area;

    let mut out = [0.0; BAND_COUNT];
    for i in 0..BAND_COUNT {
        let rt60 = if volume <= 0.0 {
            MIN_RT60_SECONDS
        } else if mean_alpha > EYRING_THRESHOLD {
            let alpha_band = (sabins[i] / surface_area).clamp(0.0, 0.999_999);
            let denom = -surface_area * (1.0 - alpha_band).ln();
            if denom <= 0.0 {
                MAX_RT60_SECONDS
            } else {
                SABINE_CONSTANT * volume / denom
            }
        } else if sabins[i] <= 0.0 {
            MAX_RT60_SECONDS
        } else {
            SABINE_CONSTANT * volume / sabins[i]
        };
        out[i] = rt60.clamp(MIN_RT60_SECONDS, MAX_RT60_SECONDS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_volume_floors_to_minimum() {
        let out = estimate_rt60(0.0, 50.0, &[5.0; BAND_COUNT]);
        assert_eq!(out, [MIN_RT60_SECONDS; BAND_COUNT]);
    }

    #[test]
    fn zero_absorption_ceilings_to_maximum() {
        let out = estimate_rt60(200.0, 50.0, &[0.0; BAND_COUNT]);
        assert_eq!(out, [MAX_RT60_SECONDS; BAND_COUNT]);
    }

    #[test]
    fn output_always_within_bounds() {
        for volume in [1.0, 50.0, 5000.0] {
            for absorption in [0.01, 1.0, 10.0, 200.0] {
                let out = estimate_rt60(volume, 80.0, &[absorption; BAND_COUNT]);
                for rt60 in out {
                    assert!(rt60 >= MIN_RT60_SECONDS && rt60 <= MAX_RT60_SECONDS);
                }
            }
        }
    }

    #[test]
    fn eyring_selected_above_threshold() {
        // Mean alpha = sabins/surface must exceed 0.3 to select Eyring.
        let surface = 100.0;
        let high_absorption = surface * 0.5; // alpha = 0.5 per band
        let sabine_result = estimate_rt60(500.0, surface, &[surface * 0.1; BAND_COUNT]);
        let eyring_result = estimate_rt60(500.0, surface, &[high_absorption; BAND_COUNT]);
        // Both must be in-range; this is mostly a smoke test that the branch
        // doesn't panic / produce nonsense for the higher-absorption path.
        assert!(eyring_result[0] < sabine_result[0]);
    }
}
