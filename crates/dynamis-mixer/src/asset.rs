//! The host audio asset boundary (spec §6): a richer capability than the
//! narrow `dynamis_sim::FrameSource` the voice chain consumes directly —
//! it additionally exposes `total_frames` and `is_exhausted` for a host to
//! query. [`AssetFrameSource`] bridges one into the other so a host-supplied
//! `AudioAsset` can still be handed to `VoiceNode::set_asset`.

use dynamis_core::{Sample, SAMPLE_RATE};
use dynamis_sim::FrameSource;

/// Host-supplied streaming asset producer (spec §6).
pub trait AudioAsset: Send {
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> usize;
    /// `-1` when unknown (e.g. a non-seekable stream).
    fn total_frames(&self) -> i64;
    /// Zero-allocation read; returns frames actually read (0 = EOS).
    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize;
    /// Logged no-op for non-seekable streams (spec §4.E, §6).
    fn reset(&mut self);
    fn is_exhausted(&self) -> bool;
}

/// Adapts any `AudioAsset` to the narrow `FrameSource` the voice chain and
/// resampler consume, tracking exhaustion locally since `FrameSource` has
/// no such query of its own.
pub struct AssetFrameSource<A: AudioAsset> {
    asset: A,
    exhausted: bool,
}

impl<A: AudioAsset> AssetFrameSource<A> {
    pub fn new(asset: A) -> Self {
        Self {
            asset,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted || self.asset.is_exhausted()
    }
}

impl<A: AudioAsset> FrameSource for AssetFrameSource<A> {
    fn sample_rate(&self) -> u32 {
        self.asset.sample_rate()
    }

    fn channel_count(&self) -> usize {
        self.asset.channel_count()
    }

    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
        let n = self.asset.read_frames(out, frames);
        if n == 0 {
            self.exhausted = true;
        }
        n
    }

    fn reset(&mut self) {
        self.asset.reset();
        self.exhausted = false;
    }
}

/// Silence generator used as a headless-CI fixture and in tests; never
/// exhausts, so it doubles as a stand-in for a looping bed track.
pub struct NullAudioAsset {
    channels: usize,
}

impl NullAudioAsset {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl AudioAsset for NullAudioAsset {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn total_frames(&self) -> i64 {
        -1
    }

    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
        out[..frames * self.channels].fill(0.0);
        frames
    }

    fn reset(&mut self) {}

    fn is_exhausted(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_asset_never_exhausts() {
        let mut src = AssetFrameSource::new(NullAudioAsset::new(1));
        let mut out = [1.0f32; 16];
        let n = src.read_frames(&mut out, 16);
        assert_eq!(n, 16);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(!src.is_exhausted());
    }

    struct OneShot {
        remaining: usize,
        channels: usize,
    }

    impl AudioAsset for OneShot {
        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }
        fn channel_count(&self) -> usize {
            self.channels
        }
        fn total_frames(&self) -> i64 {
            self.remaining as i64
        }
        fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
            let n = frames.min(self.remaining);
            out[..n * self.channels].fill(0.5);
            self.remaining -= n;
            n
        }
        fn reset(&mut self) {
            self.remaining = 0;
        }
        fn is_exhausted(&self) -> bool {
            self.remaining == 0
        }
    }

    #[test]
    fn adapter_tracks_exhaustion_after_zero_read() {
        let mut src = AssetFrameSource::new(OneShot {
            remaining: 4,
            channels: 1,
        });
        let mut out = [0.0f32; 4];
        assert_eq!(src.read_frames(&mut out, 4), 4);
        assert!(!src.is_exhausted());
        assert_eq!(src.read_frames(&mut out, 4), 0);
        assert!(src.is_exhausted());
    }
}
