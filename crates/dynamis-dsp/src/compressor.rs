//! Feed-forward RMS compressor with exponential-moving-average envelope
//! detection (spec §4.G).

use dynamis_core::{Decibels, Sample};

use crate::node::{apply_gain, DspNode};

/// EMA coefficient for the RMS envelope.
const RMS_EMA_COEFF: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct Compressor {
    name: String,
    threshold_db: f64,
    ratio: f64,
    attack_coeff: f64,
    release_coeff: f64,
    makeup_gain: Decibels,
    rms_sq: f64,
    envelope_db: f64,
    sample_rate: f64,
    last_gain_reduction_db: f64,
    post_gain: f32,
    bypass: bool,
    prepared: bool,
}

impl Compressor {
    pub fn new(name: impl Into<String>, sample_rate: f64) -> Self {
        let mut c = Self {
            name: name.into(),
            threshold_db: -18.0,
            ratio: 2.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            makeup_gain: Decibels::UNITY,
            rms_sq: 0.0,
            envelope_db: -120.0,
            sample_rate,
            last_gain_reduction_db: 0.0,
            post_gain: 1.0,
            bypass: false,
            prepared: false,
        };
        c.set_attack_release_ms(10.0, 100.0);
        c
    }

    pub fn set_threshold_db(&mut self, db: f64) {
        self.threshold_db = db;
    }

    /// Ratio must be `>= 1` (1 is a transparent pass-through).
    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.max(1.0);
    }

    pub fn set_attack_release_ms(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_coeff = Self::time_coeff(attack_ms, self.sample_rate);
        self.release_coeff = Self::time_coeff(release_ms, self.sample_rate);
    }

    pub fn set_makeup_gain_db(&mut self, db: f64) {
        self.makeup_gain = Decibels(db);
    }

    /// `1 - exp(-1/tau_samples)` (spec §4.G).
    fn time_coeff(time_ms: f64, sample_rate: f64) -> f64 {
        let tau_samples = (time_ms * 0.001 * sample_rate).max(1e-6);
        1.0 - (-1.0 / tau_samples).exp()
    }

    /// Gain reduction applied to the most recently processed sample, in dB
    /// (telemetry, spec §4.G).
    pub fn gain_reduction_db(&self) -> f64 {
        self.last_gain_reduction_db
    }
}

impl DspNode for Compressor {
    fn prepare(&mut self, _max_frames: usize, _channels: usize) {
        self.prepared = true;
    }

    fn reset(&mut self) {
        self.rms_sq = 0.0;
        self.envelope_db = -120.0;
        self.last_gain_reduction_db = 0.0;
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample], frames: usize, channels: usize) {
        debug_assert!(self.prepared, "Compressor::process called before prepare");
        let makeup_linear = self.makeup_gain.to_linear() as f32;
        for frame in 0..frames {
            let mut frame_sq = 0.0f64;
            for ch in 0..channels {
                let s = input[frame * channels + ch] as f64;
                frame_sq += s * s;
            }
            frame_sq /= channels.max(1) as f64;
            self.rms_sq += (frame_sq - self.rms_sq) * RMS_EMA_COEFF;
            let rms = self.rms_sq.sqrt().max(1e-12);
            let level_db = 20.0 * rms.log10();

            let target_db = if level_db > self.threshold_db {
                self.threshold_db + (level_db - self.threshold_db) / self.ratio
            } else {
                level_db
            };
            let coeff = if target_db < self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db += (target_db - self.envelope_db) * coeff;

            let gain_reduction_db = level_db - self.envelope_db;
            self.last_gain_reduction_db = gain_reduction_db.max(0.0);
            let gain_linear = Decibels(-self.last_gain_reduction_db).to_linear() as f32;

            for ch in 0..channels {
                let idx = frame * channels + ch;
                output[idx] = input[idx] * gain_linear * makeup_linear;
            }
        }
        apply_gain(output, frames, channels, self.post_gain);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn gain(&self) -> f32 {
        self.post_gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.post_gain = gain;
    }

    fn bypass(&self) -> bool {
        self.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_ratio_is_transparent() {
        let mut comp = Compressor::new("comp", 48_000.0);
        comp.prepare(64, 1);
        comp.set_ratio(1.0);
        let input = [0.5f32; 64];
        let mut output = [0.0f32; 64];
        comp.process(&input, &mut output, 64, 1);
        assert!((output[63] - 0.5).abs() < 0.05);
    }

    #[test]
    fn loud_signal_above_threshold_is_reduced() {
        let mut comp = Compressor::new("comp", 48_000.0);
        comp.prepare(512, 1);
        comp.set_threshold_db(-24.0);
        comp.set_ratio(4.0);
        let input = [0.9f32; 512];
        let mut output = [0.0f32; 512];
        for _ in 0..20 {
            comp.process(&input, &mut output, 512, 1);
        }
        assert!(comp.gain_reduction_db() > 0.0);
        assert!(output[511].abs() < input[511].abs());
    }

    #[test]
    fn output_always_finite() {
        let mut comp = Compressor::new("comp", 48_000.0);
        comp.prepare(256, 2);
        comp.set_threshold_db(-30.0);
        comp.set_ratio(10.0);
        comp.set_makeup_gain_db(12.0);
        let input: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.05).sin()).collect();
        let mut output = vec![0.0f32; 512];
        for _ in 0..10 {
            comp.process(&input, &mut output, 256, 2);
        }
        assert!(output.iter().all(|s| s.is_finite()));
    }
}
