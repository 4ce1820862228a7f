//! Per-voice chain: the fixed pipeline early-reflections -> EQ -> gain ->
//! reverb-send over a bound audio asset, driven by an optionally bound
//! emitter's per-block parameters (spec §4.H).

use std::sync::Arc;

use dynamis_core::{EmitterParams, EmitterParamsSource, Sample, SAMPLE_RATE};
use dynamis_sim::{FrameSource, ResamplingAdapter};

use crate::eq::EightBandEq;
use crate::gain::GainNode;
use crate::node::DspNode;
use crate::reverb_send::ReverbSend;
use crate::early_reflections::EarlyReflections;

/// The bound audio asset, transparently wrapped in a resampler when its
/// native rate isn't 48 kHz (spec §4.H: "Asset binding enforces 48 kHz at
/// bind time").
enum BoundAsset {
    Native(Box<dyn FrameSource + Send>),
    Resampled(ResamplingAdapter<Box<dyn FrameSource + Send>>),
}

impl BoundAsset {
    fn bind(asset: Box<dyn FrameSource + Send>, max_frames: usize) -> Self {
        if asset.sample_rate() == SAMPLE_RATE {
            BoundAsset::Native(asset)
        } else {
            BoundAsset::Resampled(ResamplingAdapter::new(asset, max_frames))
        }
    }

    fn channel_count(&self) -> usize {
        match self {
            BoundAsset::Native(a) => a.channel_count(),
            BoundAsset::Resampled(a) => a.channel_count(),
        }
    }

    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
        match self {
            BoundAsset::Native(a) => a.read_frames(out, frames),
            BoundAsset::Resampled(a) => a.read_frames(out, frames),
        }
    }

    fn reset(&mut self) {
        match self {
            BoundAsset::Native(a) => a.reset(),
            BoundAsset::Resampled(a) => a.reset(),
        }
    }
}

/// Fixed-pipeline per-voice DSP chain. Owned exclusively by the render
/// thread; the pool loans one to an emitter on promotion (spec §3).
pub struct VoiceNode {
    early_reflections: EarlyReflections,
    eq: EightBandEq,
    gain: GainNode,
    reverb_send: ReverbSend,

    buf_a: Vec<Sample>,
    buf_b: Vec<Sample>,
    max_frames: usize,
    channels: usize,

    asset: Option<BoundAsset>,
    emitter: Option<Arc<dyn EmitterParamsSource>>,
    last_params: EmitterParams,
    completion_pending: bool,
    prepared: bool,
}

impl VoiceNode {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            early_reflections: EarlyReflections::new(format!("{name}.er")),
            eq: EightBandEq::new(format!("{name}.eq")),
            gain: GainNode::new(format!("{name}.gain")),
            reverb_send: ReverbSend::new(format!("{name}.send")),
            buf_a: Vec::new(),
            buf_b: Vec::new(),
            max_frames: 0,
            channels: 0,
            asset: None,
            emitter: None,
            last_params: EmitterParams::default(),
            completion_pending: false,
            prepared: false,
        }
    }

    pub fn prepare(&mut self, max_frames: usize, channels: usize) {
        self.early_reflections.prepare(max_frames, channels);
        self.eq.prepare(max_frames, channels);
        self.gain.prepare(max_frames, channels);
        self.reverb_send.prepare(max_frames, channels);
        self.buf_a = vec![0.0; max_frames * channels];
        self.buf_b = vec![0.0; max_frames * channels];
        self.max_frames = max_frames;
        self.channels = channels;
        self.prepared = true;
    }

    pub fn reset(&mut self) {
        self.early_reflections.reset();
        self.eq.reset();
        self.gain.reset();
        self.reverb_send.reset();
        self.buf_a.fill(0.0);
        self.buf_b.fill(0.0);
        self.completion_pending = false;
    }

    /// Binds an audio asset, wrapping it in a resampler if needed. Passing
    /// `None` clears the binding (spec §4.H).
    pub fn set_asset(&mut self, asset: Option<Box<dyn FrameSource + Send>>) {
        self.asset = asset.map(|a| BoundAsset::bind(a, self.max_frames));
    }

    pub fn set_emitter(&mut self, emitter: Option<Arc<dyn EmitterParamsSource>>) {
        self.emitter = emitter;
    }

    pub fn is_bound(&self) -> bool {
        self.emitter.is_some()
    }

    pub fn completion_pending(&self) -> bool {
        self.completion_pending
    }

    /// Pulls the bound emitter's current parameters and applies them to
    /// the chain: per-band occlusion to the EQ, wet gain to the reverb
    /// send, master gain to the smoothed gain node (spec §4.J step 4).
    pub fn update_from_emitter(&mut self) {
        let Some(emitter) = &self.emitter else { return };
        let params = emitter.params();
        self.eq.apply_occlusion(&params.occlusion_per_band);
        self.reverb_send.set_send_level(params.reverb_wet_gain as f32);
        self.gain.set_target_gain(params.master_gain);
        self.last_params = params;
    }

    /// Renders one block: reads from the bound asset (handling loop/EOS),
    /// runs the fixed chain, and returns `(dry, reverb_send)` slices sized
    /// `frames * channels`. Returns `None` if no asset is bound.
    pub fn render(&mut self, frames: usize) -> Option<(&[Sample], &[Sample])> {
        debug_assert!(self.prepared, "VoiceNode::render called before prepare");
        let channels = self.channels;
        let n = frames * channels;
        let asset = self.asset.as_mut()?;

        let mut read = asset.read_frames(&mut self.buf_a[..n], frames);
        if read == 0 {
            if self.last_params.loop_enabled {
                asset.reset();
                read = asset.read_frames(&mut self.buf_a[..n], frames);
            } else {
                self.completion_pending = true;
            }
        }
        if read < frames {
            self.buf_a[read * channels..n].fill(0.0);
        }

        self.early_reflections
            .process(&self.buf_a[..n], &mut self.buf_b[..n], frames, channels);
        self.eq
            .process(&self.buf_b[..n], &mut self.buf_a[..n], frames, channels);
        self.gain
            .process(&self.buf_a[..n], &mut self.buf_b[..n], frames, channels);
        // buf_b now holds the dry (post-gain, pre-send) output.
        self.reverb_send
            .process(&self.buf_b[..n], &mut self.buf_a[..n], frames, channels);

        Some((&self.buf_b[..n], &self.buf_a[..n]))
    }

    pub fn early_reflections_mut(&mut self) -> &mut EarlyReflections {
        &mut self.early_reflections
    }

    pub fn eq_mut(&mut self) -> &mut EightBandEq {
        &mut self.eq
    }
}
