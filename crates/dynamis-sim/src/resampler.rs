//! Stateless linear resampler from an arbitrary input rate to
//! `SAMPLE_RATE`, plus a streaming-asset wrapper that allocates its
//! intermediate buffer once (spec §4.E).

use dynamis_core::{Sample, SAMPLE_RATE};

/// Number of input frames needed to produce `output_frames` at
/// `input_rate -> SAMPLE_RATE`, rounded up with one extra guard frame for
/// the trailing interpolation sample.
pub fn input_frames_required(output_frames: usize, input_rate: u32) -> usize {
    if input_rate == SAMPLE_RATE || output_frames == 0 {
        return output_frames;
    }
    let ratio = input_rate as f64 / SAMPLE_RATE as f64;
    (output_frames as f64 * ratio).ceil() as usize + 1
}

/// Linearly interpolates `input` (interleaved, `channels` channels) from
/// `input_rate` to `SAMPLE_RATE`, writing exactly `output_frames` frames
/// into `out`. If rates match, performs a direct copy. Allocation-free:
/// all buffers are caller-supplied.
///
/// Returns the number of *input* frames actually consumed (so a streaming
/// caller knows how much of `input` to retain for the next call).
pub fn resample_linear(
    input: &[Sample],
    input_rate: u32,
    channels: usize,
    out: &mut [Sample],
    output_frames: usize,
) -> usize {
    debug_assert!(out.len() >= output_frames * channels);
    if input_rate == SAMPLE_RATE {
        let n = output_frames.min(input.len() / channels.max(1));
        out[..n * channels].copy_from_slice(&input[..n * channels]);
        return n;
    }
    if channels == 0 || output_frames == 0 {
        return 0;
    }
    let input_frames = input.len() / channels;
    if input_frames == 0 {
        return 0;
    }
    let ratio = input_rate as f64 / SAMPLE_RATE as f64;
    let mut max_src_frame = 0usize;
    for out_frame in 0..output_frames {
        let src_pos = out_frame as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = src_pos - src_idx as f64;
        let idx0 = src_idx.min(input_frames - 1);
        let idx1 = (src_idx + 1).min(input_frames - 1);
        max_src_frame = max_src_frame.max(idx1);
        for ch in 0..channels {
            let s0 = input[idx0 * channels + ch];
            let s1 = input[idx1 * channels + ch];
            out[out_frame * channels + ch] = s0 + (s1 - s0) * frac as Sample;
        }
    }
    max_src_frame + 1
}

/// Host-supplied streaming audio asset capability the resampling adapter
/// wraps (mirrors the `AudioAsset` boundary in `dynamis-mixer`, but kept
/// here as a narrow trait so this crate doesn't depend on the mixer).
pub trait FrameSource {
    fn sample_rate(&self) -> u32;
    fn channel_count(&self) -> usize;
    /// Zero-allocation read; returns frames actually read (0 = EOS).
    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize;
    /// Logged no-op for non-seekable streams.
    fn reset(&mut self);
}

/// Lets a voice chain hold its bound asset as `Box<dyn FrameSource + Send>`
/// and still pass it to [`ResamplingAdapter`] without a wrapper type.
impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
        (**self).read_frames(out, frames)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Wraps a [`FrameSource`] to transparently resample to `SAMPLE_RATE`. The
/// intermediate buffer is allocated once at construction; `read_frames` is
/// allocation-free thereafter (spec §4.E, §6: "non-48kHz assets are
/// transparently wrapped").
pub struct ResamplingAdapter<S: FrameSource> {
    source: S,
    scratch: Vec<Sample>,
    channels: usize,
}

impl<S: FrameSource> ResamplingAdapter<S> {
    /// `max_output_frames` bounds the largest block this adapter will ever
    /// be asked for; the scratch buffer is sized against it once.
    pub fn new(source: S, max_output_frames: usize) -> Self {
        let channels = source.channel_count();
        let scratch_frames = input_frames_required(max_output_frames, source.sample_rate());
        Self {
            source,
            scratch: vec![0.0; scratch_frames * channels.max(1)],
            channels,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Reads and resamples up to `frames` output frames into `out`.
    /// Returns frames actually produced (0 = source exhausted).
    pub fn read_frames(&mut self, out: &mut [Sample], frames: usize) -> usize {
        let input_rate = self.source.sample_rate();
        if input_rate == SAMPLE_RATE {
            return self.source.read_frames(out, frames);
        }
        let needed = input_frames_required(frames, input_rate).min(self.scratch.len() / self.channels.max(1));
        let read = self.source.read_frames(&mut self.scratch, needed);
        if read == 0 {
            return 0;
        }
        resample_linear(
            &self.scratch[..read * self.channels],
            input_rate,
            self.channels,
            out,
            frames,
        );
        // Output frame count is bounded by how much input we actually read;
        // scale down proportionally rather than claim frames we couldn't
        // have sourced.
        let ratio = SAMPLE_RATE as f64 / input_rate as f64;
        ((read as f64 * ratio).floor() as usize).min(frames)
    }

    pub fn reset(&mut self) {
        self.source.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rates_is_direct_copy() {
        let input = [0.1, 0.2, 0.3, 0.4];
        let mut out = [0.0; 4];
        let consumed = resample_linear(&input, SAMPLE_RATE, 1, &mut out, 4);
        assert_eq!(consumed, 4);
        assert_eq!(out, input);
    }

    #[test]
    fn upsampling_interpolates_between_known_points() {
        // 24kHz -> 48kHz is a factor of 2 in rate, so every *other* output
        // sample should land close to an input sample.
        let input = [0.0, 1.0, 2.0, 3.0];
        let mut out = [0.0; 8];
        resample_linear(&input, 24_000, 1, &mut out, 8);
        assert!((out[0] - 0.0).abs() < 1e-9);
        assert!((out[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn input_frames_required_matches_rate_when_equal() {
        assert_eq!(input_frames_required(256, SAMPLE_RATE), 256);
        assert!(input_frames_required(256, 24_000) < 256);
        assert!(input_frames_required(256, 96_000) > 256);
    }
}
