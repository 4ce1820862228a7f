//! Fingerprint-driven reverb: wraps a [`SchroederReverb`] tank and steers
//! its RT60/damping/wet-mix targets each block from a blended acoustic
//! fingerprint, smoothing toward the new target rather than snapping
//! (spec §4.E, §4.G).

use dynamis_core::{mean, mean_range, Sample, BAND_COUNT, SMOOTH_COEFF};
use dynamis_sim::Fingerprint;

use crate::node::DspNode;
use crate::schroeder::SchroederReverb;

/// Bands below this index are treated as "low" for the damping estimate;
/// matches the low/high split implied by `BAND_CENTERS_HZ` (spec §4.E).
const HIGH_BAND_SPLIT: usize = BAND_COUNT / 2;

pub struct FingerprintReverb {
    tank: SchroederReverb,
    target_rt60: f64,
    target_damping: f64,
    target_wet_mix: f64,
    smooth_coeff: f64,
}

impl FingerprintReverb {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            tank: SchroederReverb::new(name),
            target_rt60: 1.0,
            target_damping: 0.3,
            target_wet_mix: 0.3,
            smooth_coeff: SMOOTH_COEFF,
        }
    }

    /// Recomputes automation targets from a blended fingerprint. Does not
    /// itself advance the smoothing; call once per block before `process`.
    pub fn set_targets_from_fingerprint(&mut self, fp: &Fingerprint) {
        let rt60_bands = fp.rt60_bands();
        self.target_rt60 = mean(rt60_bands).max(0.01);

        let low_rt60 = mean_range(rt60_bands, 0, HIGH_BAND_SPLIT).max(1e-6);
        let high_rt60 = mean_range(rt60_bands, HIGH_BAND_SPLIT, BAND_COUNT);
        self.target_damping = (1.0 - 0.5 * high_rt60 / low_rt60).clamp(0.0, 1.0);

        let mean_transmission = mean(fp.portal_transmission_bands());
        self.target_wet_mix = (0.5 + 0.5 * mean_transmission).clamp(0.0, 1.0);
    }

    /// Advances RT60/damping/wet-mix one smoothing step toward their
    /// current targets.
    fn smooth_toward_targets(&mut self) {
        let rt60 = self.tank.rt60_seconds() + (self.target_rt60 - self.tank.rt60_seconds()) * self.smooth_coeff;
        let damping =
            self.tank.damping() + (self.target_damping - self.tank.damping()) * self.smooth_coeff;
        let wet_mix =
            self.tank.wet_mix() + (self.target_wet_mix - self.tank.wet_mix()) * self.smooth_coeff;
        self.tank.set_rt60_seconds(rt60);
        self.tank.set_damping(damping);
        self.tank.set_wet_mix(wet_mix);
    }
}

impl DspNode for FingerprintReverb {
    fn prepare(&mut self, max_frames: usize, channels: usize) {
        self.tank.prepare(max_frames, channels);
    }

    fn reset(&mut self) {
        self.tank.reset();
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample], frames: usize, channels: usize) {
        self.smooth_toward_targets();
        self.tank.process(input, output, frames, channels);
    }

    fn name(&self) -> &str {
        self.tank.name()
    }

    fn gain(&self) -> f32 {
        self.tank.gain()
    }

    fn set_gain(&mut self, gain: f32) {
        self.tank.set_gain(gain);
    }

    fn bypass(&self) -> bool {
        self.tank.bypass()
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.tank.set_bypass(bypass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamis_core::UNITY_BANDS;

    fn fp(rt60_low: f64, rt60_high: f64, transmission: f64) -> Fingerprint {
        let mut rt60_bands = [rt60_low; BAND_COUNT];
        for v in rt60_bands.iter_mut().skip(HIGH_BAND_SPLIT) {
            *v = rt60_high;
        }
        dynamis_sim::Fingerprint::try_new(
            1,
            100.0,
            100.0,
            1.0,
            dynamis_core::ZERO_BANDS,
            1.0,
            rt60_bands,
            [transmission; BAND_COUNT],
        )
        .unwrap()
    }

    #[test]
    fn targets_track_fingerprint_then_smooth_gradually() {
        let mut reverb = FingerprintReverb::new("reverb");
        reverb.prepare(256, 1);
        let initial_rt60 = reverb.tank.rt60_seconds();
        reverb.set_targets_from_fingerprint(&fp(2.0, 1.0, 1.0));

        let input = [0.0f32; 256];
        let mut output = [0.0f32; 256];
        reverb.process(&input, &mut output, 256, 1);
        assert!(reverb.tank.rt60_seconds() > initial_rt60);
        assert!(reverb.tank.rt60_seconds() < 2.0);
    }

    #[test]
    fn full_transmission_biases_wet_mix_high() {
        let mut reverb = FingerprintReverb::new("reverb");
        reverb.prepare(256, 1);
        reverb.set_targets_from_fingerprint(&fp(1.0, 1.0, 1.0));
        assert!((reverb.target_wet_mix - 1.0).abs() < 1e-9);
        reverb.set_targets_from_fingerprint(&fp(1.0, 1.0, 0.0));
        assert!((reverb.target_wet_mix - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_smoothing_tail_state() {
        let mut reverb = FingerprintReverb::new("reverb");
        reverb.prepare(512, 1);
        reverb.set_targets_from_fingerprint(&fp(3.0, 1.0, 1.0));
        let mut input = vec![0.0f32; 512];
        input[0] = 1.0;
        let mut output = vec![0.0f32; 512];
        for _ in 0..5 {
            reverb.process(&input, &mut output, 512, 1);
        }
        reverb.reset();
        let mut silence_check = vec![0.0f32; 512];
        reverb.process(&vec![0.0f32; 512], &mut silence_check, 512, 1);
        assert!(silence_check.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn output_always_finite_with_moving_targets() {
        let mut reverb = FingerprintReverb::new("reverb");
        reverb.prepare(256, 2);
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.04).sin()).collect();
        let mut output = vec![0.0f32; 512];
        for i in 0..20 {
            let t = i as f64 / 20.0;
            reverb.set_targets_from_fingerprint(&fp(0.5 + t * 2.0, 0.3 + t, 1.0 - t * 0.5));
            reverb.process(&input, &mut output, 256, 2);
        }
        assert!(output.iter().all(|s| s.is_finite()));
        let _ = UNITY_BANDS;
    }
}
