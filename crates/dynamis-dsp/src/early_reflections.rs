//! Early reflections: a circular delay line per channel plus up to
//! `MAX_REFLECTIONS` taps, double-buffered between the emitter worker
//! (producer) and the render thread (consumer) exactly like the world
//! snapshot's front/back index idiom (spec §4.G, §9).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dynamis_core::{Sample, MAX_REFLECTIONS, SAMPLE_RATE, SPEED_OF_SOUND};

use crate::node::{apply_gain, DspNode};

/// One reflection tap: gain `1/(1+d)`, delay in samples from distance `d`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tap {
    gain: f64,
    delay_samples: usize,
}

struct TapSlot {
    taps: UnsafeCell<[Tap; MAX_REFLECTIONS]>,
    active: UnsafeCell<usize>,
}

// SAFETY: exactly one producer writes the back slot (`1 - front`), the
// render thread only ever reads the front slot; the atomic flip on `front`
// provides the happens-before edge, identical to `WorldSnapshotManager`.
unsafe impl Sync for TapSlot {}

impl Default for TapSlot {
    fn default() -> Self {
        Self {
            taps: UnsafeCell::new([Tap::default(); MAX_REFLECTIONS]),
            active: UnsafeCell::new(0),
        }
    }
}

/// Shared double buffer of reflection taps. Cheap to clone (`Arc` handle);
/// the render-owned [`EarlyReflections`] node holds one end, a
/// [`ReflectionSinkHandle`] the other.
pub struct ReflectionTapBuffer {
    slots: [TapSlot; 2],
    front: AtomicUsize,
}

impl Default for ReflectionTapBuffer {
    fn default() -> Self {
        Self {
            slots: [TapSlot::default(), TapSlot::default()],
            front: AtomicUsize::new(0),
        }
    }
}

impl ReflectionTapBuffer {
    fn publish(&self, taps: &[Tap]) {
        let back = 1 - self.front.load(Ordering::Relaxed);
        let n = taps.len().min(MAX_REFLECTIONS);
        // SAFETY: sole writer of the back slot; the render thread only
        // reads the front slot (`front` hasn't flipped to `back` yet).
        unsafe {
            let dest = &mut *self.slots[back].taps.get();
            dest[..n].copy_from_slice(&taps[..n]);
            *self.slots[back].active.get() = n;
        }
        self.front.store(back, Ordering::Release);
    }

    /// Render-thread read: copies the current tap set into a caller-owned,
    /// fixed-size array (no heap allocation — the render thread must not
    /// allocate after `prepare`, spec §5). Reflection order doesn't matter
    /// since taps sum.
    fn read(&self) -> ([Tap; MAX_REFLECTIONS], usize) {
        let idx = self.front.load(Ordering::Acquire);
        // SAFETY: `idx` identifies a slot the producer will not write again
        // until it flips `front` away from it.
        unsafe {
            let active = *self.slots[idx].active.get();
            (*self.slots[idx].taps.get(), active)
        }
    }

    fn clear(&self) {
        self.publish(&[]);
    }
}

/// Narrow capability interface the voice manager uses to push reflection
/// geometry without depending on concrete DSP types (spec §9).
pub trait EarlyReflectionSink: Send {
    /// Begins staging a new tap set (called once per ray-fan update).
    fn begin(&mut self);
    /// Stages one reflection from a hit distance in metres.
    fn push_reflection(&mut self, distance_m: f64);
    /// Publishes the staged set with release ordering; clears and
    /// publishes an empty set if nothing was staged.
    fn commit(&mut self);
}

/// Producer-side handle: owned exclusively by one emitter's worker.
pub struct ReflectionSinkHandle {
    shared: Arc<ReflectionTapBuffer>,
    staging: Vec<Tap>,
}

impl ReflectionSinkHandle {
    fn new(shared: Arc<ReflectionTapBuffer>) -> Self {
        Self {
            shared,
            staging: Vec::with_capacity(MAX_REFLECTIONS),
        }
    }
}

impl EarlyReflectionSink for ReflectionSinkHandle {
    fn begin(&mut self) {
        self.staging.clear();
    }

    fn push_reflection(&mut self, distance_m: f64) {
        if self.staging.len() >= MAX_REFLECTIONS {
            return;
        }
        let distance_m = distance_m.max(0.0);
        let gain = 1.0 / (1.0 + distance_m);
        let delay_samples = (distance_m / SPEED_OF_SOUND * SAMPLE_RATE as f64).round() as usize;
        self.staging.push(Tap { gain, delay_samples });
    }

    fn commit(&mut self) {
        self.shared.publish(&self.staging);
    }
}

/// Max ray distance the voice manager uses for the reflection fan (30 m),
/// driving the delay line's minimum required length.
const MAX_REFLECTION_DISTANCE_M: f64 = 30.0;

/// Circular-delay-line early reflections node.
pub struct EarlyReflections {
    name: String,
    shared: Arc<ReflectionTapBuffer>,
    /// Per-channel circular delay buffer.
    delay: Vec<Vec<Sample>>,
    write_pos: usize,
    max_delay_samples: usize,
    post_gain: f32,
    bypass: bool,
    prepared: bool,
}

impl EarlyReflections {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(ReflectionTapBuffer::default()),
            delay: Vec::new(),
            write_pos: 0,
            max_delay_samples: 0,
            post_gain: 1.0,
            bypass: false,
            prepared: false,
        }
    }

    /// Hands out a producer handle bound to this node's shared tap buffer;
    /// installed into an emitter on promotion (spec §4.F).
    pub fn sink_handle(&self) -> ReflectionSinkHandle {
        ReflectionSinkHandle::new(self.shared.clone())
    }

    /// Zeros the active tap count — called when clearing the sink on
    /// demotion (spec §4.G).
    pub fn clear_sink(&self) {
        self.shared.clear();
    }
}

impl DspNode for EarlyReflections {
    fn prepare(&mut self, max_frames: usize, channels: usize) {
        let min_delay_samples =
            (MAX_REFLECTION_DISTANCE_M / SPEED_OF_SOUND * SAMPLE_RATE as f64).ceil() as usize;
        self.max_delay_samples = min_delay_samples + max_frames;
        self.delay = vec![vec![0.0; self.max_delay_samples]; channels];
        self.write_pos = 0;
        self.prepared = true;
    }

    fn reset(&mut self) {
        for ch in &mut self.delay {
            ch.fill(0.0);
        }
        self.write_pos = 0;
        self.shared.clear();
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample], frames: usize, channels: usize) {
        debug_assert!(self.prepared, "EarlyReflections::process called before prepare");
        let (taps, active) = self.shared.read();
        let max_delay = self.max_delay_samples;

        for frame in 0..frames {
            for ch in 0..channels {
                let idx = frame * channels + ch;
                let dry = input[idx];
                self.delay[ch][self.write_pos] = dry;

                let mut sum = dry as f64;
                for tap in &taps[..active] {
                    let read_pos =
                        (self.write_pos + max_delay - tap.delay_samples.min(max_delay - 1)) % max_delay;
                    sum += self.delay[ch][read_pos] as f64 * tap.gain;
                }
                output[idx] = sum as Sample;
            }
            self.write_pos = (self.write_pos + 1) % max_delay;
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
    fn no_taps_is_pass_through() {
        let mut er = EarlyReflections::new("er");
        er.prepare(64, 1);
        let input = [0.5f32; 64];
        let mut output = [0.0f32; 64];
        er.process(&input, &mut output, 64, 1);
        assert_eq!(output, input);
    }

    #[test]
    fn committed_tap_adds_delayed_energy() {
        let mut er = EarlyReflections::new("er");
        er.prepare(256, 1);
        let mut sink = er.sink_handle();
        sink.begin();
        sink.push_reflection(3.43); // ~100 samples at 343 m/s, 48kHz -> 480 samples... compute exactly
        sink.commit();

        let mut input = vec![0.0f32; 256];
        input[0] = 1.0;
        let mut output = vec![0.0f32; 256];
        er.process(&input, &mut output, 256, 1);
        // Some later sample should carry reflected energy from the impulse.
        assert!(output.iter().skip(1).any(|&s| s.abs() > 1e-6));
    }

    #[test]
    fn clear_sink_zeros_active_count() {
        let mut er = EarlyReflections::new("er");
        er.prepare(64, 1);
        let mut sink = er.sink_handle();
        sink.begin();
        sink.push_reflection(5.0);
        sink.commit();
        er.clear_sink();
        let (_, active) = er.shared.read();
        assert_eq!(active, 0);
    }

    #[test]
    fn output_always_finite() {
        let mut er = EarlyReflections::new("er");
        er.prepare(128, 2);
        let mut sink = er.sink_handle();
        sink.begin();
        for d in [1.0, 5.0, 10.0, 20.0, 29.0, 30.0] {
            sink.push_reflection(d);
        }
        sink.commit();
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.2).sin()).collect();
        let mut output = vec![0.0f32; 256];
        for _ in 0..5 {
            er.process(&input, &mut output, 128, 2);
        }
        assert!(output.iter().all(|s| s.is_finite()));
    }
}
