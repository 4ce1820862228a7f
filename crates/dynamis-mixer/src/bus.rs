//! Named bus graph node: sources, effect chain, accumulator/scratch
//! buffers, and a submitted-signal inlet (spec §4.I). Buses nest: a
//! parent's `sources` list may itself hold child `AudioBus`es via the
//! narrow [`BusSource`] seam, so the master bus recursively renders its
//! whole subtree without knowing it is talking to other buses.

use dynamis_core::Sample;
use dynamis_dsp::{apply_gain, DspNode};

/// Anything an `AudioBus` can sum as an input: a child bus, or in
/// principle any other producer the designer layer wires in. Kept
/// separate from [`DspNode`] because a source has no dry/wet notion and
/// no post-gain of its own at this seam — gain lives on the bus itself.
pub trait BusSource: Send {
    fn prepare(&mut self, max_frames: usize, channels: usize);
    fn process_into(&mut self, out: &mut [Sample], frames: usize, channels: usize);
}

/// The `MixBusControl` capability (spec §4.I, §9): designer/mix-snapshot
/// code consumes buses only through this seam, never the concrete type.
pub trait MixBusControl: Send + Sync {
    fn name(&self) -> &str;
    fn gain(&self) -> f32;
    fn set_gain(&mut self, gain: f32);
    fn bypass(&self) -> bool;
    fn set_bypass(&mut self, bypass: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrepState {
    Unprepared,
    Prepared { max_frames: usize, channels: usize },
}

/// Named graph node: sums its sources, runs its own submitted-signal
/// inlet, chains its effects in order, and applies its own gain last
/// (spec §4.I steps 1-4).
pub struct AudioBus {
    name: String,
    gain: f32,
    bypass: bool,
    sources: Vec<Box<dyn BusSource>>,
    effects: Vec<Box<dyn DspNode>>,
    accumulator: Vec<Sample>,
    scratch: Vec<Sample>,
    submitted: Vec<Sample>,
    chain_a: Vec<Sample>,
    chain_b: Vec<Sample>,
    state: PrepState,
}

impl AudioBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gain: 1.0,
            bypass: false,
            sources: Vec::new(),
            effects: Vec::new(),
            accumulator: Vec::new(),
            scratch: Vec::new(),
            submitted: Vec::new(),
            chain_a: Vec::new(),
            chain_b: Vec::new(),
            state: PrepState::Unprepared,
        }
    }

    pub fn is_prepared(&self) -> bool {
        matches!(self.state, PrepState::Prepared { .. })
    }

    /// Populates every buffer and recursively prepares sources and
    /// effects. Re-entrant: calling again with a larger size grows every
    /// buffer and re-prepares children (spec §4.J "state machine for bus
    /// preparation").
    pub fn prepare(&mut self, max_frames: usize, channels: usize) {
        let n = max_frames * channels;
        self.accumulator = vec![0.0; n];
        self.scratch = vec![0.0; n];
        self.submitted = vec![0.0; n];
        self.chain_a = vec![0.0; n];
        self.chain_b = vec![0.0; n];
        for source in &mut self.sources {
            source.prepare(max_frames, channels);
        }
        for effect in &mut self.effects {
            effect.prepare(max_frames, channels);
        }
        self.state = PrepState::Prepared { max_frames, channels };
    }

    /// Releases every buffer, returning the bus to `Unprepared`. Effect
    /// and source *state* (filter memory, delay lines) is untouched — use
    /// [`AudioBus::reset_state`] for that.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.scratch.clear();
        self.submitted.clear();
        self.chain_a.clear();
        self.chain_b.clear();
        self.state = PrepState::Unprepared;
    }

    /// Clears every effect's internal state without releasing buffers
    /// (e.g. on a hard scene cut that should not also reallocate).
    pub fn reset_state(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    /// Adds a source, auto-preparing it if this bus is already prepared
    /// (spec §4.I "dynamic mutation contract").
    pub fn add_source(&mut self, mut source: Box<dyn BusSource>) {
        if let PrepState::Prepared { max_frames, channels } = self.state {
            source.prepare(max_frames, channels);
        }
        self.sources.push(source);
    }

    /// Adds an effect to the end of the chain, auto-preparing it if this
    /// bus is already prepared.
    pub fn add_effect(&mut self, mut effect: Box<dyn DspNode>) {
        if let PrepState::Prepared { max_frames, channels } = self.state {
            effect.prepare(max_frames, channels);
        }
        self.effects.push(effect);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// The sole legal way for external signal to enter a bus (spec §4.I:
    /// "direct accumulator writes are forbidden"). Additive: multiple
    /// submissions in the same block sum before the next render.
    pub fn submit_block(&mut self, signal: &[Sample], frames: usize, channels: usize) {
        let n = frames * channels;
        debug_assert!(self.submitted.len() >= n, "submit_block before prepare");
        for (dst, src) in self.submitted[..n].iter_mut().zip(&signal[..n]) {
            *dst += src;
        }
    }

    /// Per-block render (spec §4.I steps 1-4): zero + mix the submitted
    /// inlet, sum every source, chain every effect in order, then apply
    /// this bus's own gain last. `bypass` skips the effect chain but the
    /// bus's gain still applies (matches the node-level bypass contract).
    fn render_into(&mut self, out: &mut [Sample], frames: usize, channels: usize) {
        let n = frames * channels;

        self.accumulator[..n].fill(0.0);
        for (dst, src) in self.accumulator[..n].iter_mut().zip(&self.submitted[..n]) {
            *dst += *src;
        }
        self.submitted[..n].fill(0.0);

        for source in &mut self.sources {
            source.process_into(&mut self.scratch[..n], frames, channels);
            for (dst, src) in self.accumulator[..n].iter_mut().zip(&self.scratch[..n]) {
                *dst += *src;
            }
        }

        let final_slice: &[Sample] = if self.bypass || self.effects.is_empty() {
            &self.accumulator[..n]
        } else {
            self.chain_a[..n].copy_from_slice(&self.accumulator[..n]);
            let mut use_a = true;
            for effect in &mut self.effects {
                if use_a {
                    effect.process(&self.chain_a[..n], &mut self.chain_b[..n], frames, channels);
                } else {
                    effect.process(&self.chain_b[..n], &mut self.chain_a[..n], frames, channels);
                }
                use_a = !use_a;
            }
            if use_a {
                &self.chain_a[..n]
            } else {
                &self.chain_b[..n]
            }
        };
        out[..n].copy_from_slice(final_slice);
        apply_gain(out, frames, channels, self.gain);
    }

    /// Convenience for the mixer's top-level master-bus step (spec §4.J
    /// step 7: "process the master bus from a zero input").
    pub fn render_from_silence(&mut self, out: &mut [Sample], frames: usize, channels: usize) {
        self.render_into(out, frames, channels);
    }
}

impl BusSource for AudioBus {
    fn prepare(&mut self, max_frames: usize, channels: usize) {
        AudioBus::prepare(self, max_frames, channels);
    }

    fn process_into(&mut self, out: &mut [Sample], frames: usize, channels: usize) {
        self.render_into(out, frames, channels);
    }
}

impl MixBusControl for AudioBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
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

    struct ConstSource(Sample);
    impl BusSource for ConstSource {
        fn prepare(&mut self, _: usize, _: usize) {}
        fn process_into(&mut self, out: &mut [Sample], frames: usize, channels: usize) {
            out[..frames * channels].fill(self.0);
        }
    }

    #[test]
    fn direct_accumulator_writes_are_impossible_only_submit_and_sources_contribute() {
        let mut bus = AudioBus::new("sfx");
        bus.prepare(4, 1);
        bus.add_source(Box::new(ConstSource(0.25)));
        bus.submit_block(&[0.1, 0.1, 0.1, 0.1], 4, 1);
        let mut out = [0.0f32; 4];
        bus.render_from_silence(&mut out, 4, 1);
        for s in out {
            assert!((s - 0.35).abs() < 1e-6);
        }
    }

    #[test]
    fn submitted_inlet_is_cleared_after_one_block() {
        let mut bus = AudioBus::new("sfx");
        bus.prepare(2, 1);
        bus.submit_block(&[1.0, 1.0], 2, 1);
        let mut out = [0.0f32; 2];
        bus.render_from_silence(&mut out, 2, 1);
        assert_eq!(out, [1.0, 1.0]);
        bus.render_from_silence(&mut out, 2, 1);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn gain_is_applied_last_even_when_bypassed() {
        let mut bus = AudioBus::new("master");
        bus.prepare(2, 1);
        bus.set_gain(0.5);
        bus.set_bypass(true);
        bus.submit_block(&[1.0, 1.0], 2, 1);
        let mut out = [0.0f32; 2];
        bus.render_from_silence(&mut out, 2, 1);
        assert_eq!(out, [0.5, 0.5]);
    }

    #[test]
    fn nested_bus_sums_into_parent() {
        let mut child = AudioBus::new("sfx");
        child.prepare(2, 1);
        child.submit_block(&[0.4, 0.4], 2, 1);

        let mut master = AudioBus::new("master");
        master.add_source(Box::new(child));
        master.prepare(2, 1);
        let mut out = [0.0f32; 2];
        master.render_from_silence(&mut out, 2, 1);
        assert_eq!(out, [0.4, 0.4]);
    }

    #[test]
    fn adding_source_after_prepare_auto_prepares_it() {
        let mut master = AudioBus::new("master");
        master.prepare(4, 2);
        master.add_source(Box::new(ConstSource(0.1)));
        let mut out = [0.0f32; 8];
        master.render_from_silence(&mut out, 4, 2);
        for s in out {
            assert!((s - 0.1).abs() < 1e-6);
        }
    }
}
