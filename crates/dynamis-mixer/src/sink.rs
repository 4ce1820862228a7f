//! The audio device sink boundary (spec §6): the host delivers a blocking
//! `write(buffer, frames)` and the render loop never needs to know
//! whether that is a real device, a file writer, or a headless null sink.

use thiserror::Error;

use dynamis_core::Sample;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("audio device open failed: {0}")]
    OpenFailed(String),
    #[error("audio device write failed: {0}")]
    WriteFailed(String),
}

/// Host-implemented device boundary. `write` is allowed to block (the
/// spec's "blocking write(buffer, frames) sink"); the render loop's own
/// allocation and ordering contracts stop at this seam.
pub trait AudioSink: Send {
    fn open(&mut self, sample_rate: u32, channels: usize, block_size: usize) -> Result<(), SinkError>;
    fn write(&mut self, interleaved: &[Sample], frames: usize, channels: usize) -> Result<(), SinkError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn actual_sample_rate(&self) -> u32;
    fn output_latency_ms(&self) -> f64;
}

/// Discards every buffer; required for headless CI (spec §6, `audio.device
/// = null`). Still tracks frames written so a test can assert the render
/// loop actually reached the sink.
pub struct NullAudioSink {
    open: bool,
    sample_rate: u32,
    frames_written: u64,
}

impl Default for NullAudioSink {
    fn default() -> Self {
        Self {
            open: false,
            sample_rate: 0,
            frames_written: 0,
        }
    }
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for NullAudioSink {
    fn open(&mut self, sample_rate: u32, _channels: usize, _block_size: usize) -> Result<(), SinkError> {
        self.sample_rate = sample_rate;
        self.open = true;
        Ok(())
    }

    fn write(&mut self, _interleaved: &[Sample], frames: usize, _channels: usize) -> Result<(), SinkError> {
        if !self.open {
            return Err(SinkError::WriteFailed("sink not open".into()));
        }
        self.frames_written += frames as u64;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn actual_sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn output_latency_ms(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_before_open_is_an_error() {
        let mut sink = NullAudioSink::new();
        assert!(sink.write(&[0.0; 4], 4, 1).is_err());
    }

    #[test]
    fn discards_but_counts_frames() {
        let mut sink = NullAudioSink::new();
        sink.open(48_000, 2, 256).unwrap();
        sink.write(&[0.0; 512], 256, 2).unwrap();
        assert_eq!(sink.frames_written(), 256);
    }
}
