//! Fixed-capacity voice pool: pre-prepared `VoiceNode`s loaned to emitters
//! on promotion (spec §3, §4.H). `acquire` never allocates; exhaustion is
//! signalled by returning `None`, which is the contract upstream callers
//! (the voice manager) use for flow control rather than an error.

use crate::chain::VoiceNode;

/// Opaque handle to a loaned voice slot. Callers pass it back to
/// [`VoicePool::release`]; it carries no lifetime so it can be stored
/// alongside an emitter across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceHandle(usize);

impl VoiceHandle {
    pub fn slot(&self) -> usize {
        self.0
    }
}

/// Fixed-capacity array of pre-built voice nodes plus an in-use bitmap.
pub struct VoicePool {
    voices: Vec<VoiceNode>,
    in_use: Vec<bool>,
}

impl VoicePool {
    /// Builds and `prepare`s every voice node up front; this is the pool's
    /// sole allocation point.
    pub fn new(capacity: usize, max_frames: usize, channels: usize) -> Self {
        let mut voices: Vec<VoiceNode> = (0..capacity)
            .map(|i| VoiceNode::new(format!("voice{i}")))
            .collect();
        for v in &mut voices {
            v.prepare(max_frames, channels);
        }
        Self {
            voices,
            in_use: vec![false; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.iter().filter(|&&b| b).count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.in_use.iter().all(|&b| b)
    }

    /// Loans the first free voice, resetting its state. Returns `None`
    /// without allocating when every slot is in use (spec §4.H).
    pub fn acquire(&mut self) -> Option<(VoiceHandle, &mut VoiceNode)> {
        let idx = self.in_use.iter().position(|&used| !used)?;
        self.in_use[idx] = true;
        self.voices[idx].reset();
        Some((VoiceHandle(idx), &mut self.voices[idx]))
    }

    pub fn get_mut(&mut self, handle: VoiceHandle) -> &mut VoiceNode {
        &mut self.voices[handle.0]
    }

    /// Clears the voice's bindings and returns it to the free set.
    pub fn release(&mut self, handle: VoiceHandle) {
        let idx = handle.0;
        self.voices[idx].set_asset(None);
        self.voices[idx].set_emitter(None);
        self.voices[idx].reset();
        self.in_use[idx] = false;
    }

    /// Iterates every currently-loaned voice with its handle, for the
    /// render loop's per-block voice sweep and completion drain.
    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (VoiceHandle, &mut VoiceNode)> {
        let in_use = &self.in_use;
        self.voices
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| in_use[*i])
            .map(|(i, v)| (VoiceHandle(i), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_exhausts_then_returns_none() {
        let mut pool = VoicePool::new(2, 64, 1);
        let (h0, _) = pool.acquire().unwrap();
        let (h1, _) = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert!(pool.is_exhausted());
        pool.release(h0);
        assert!(pool.acquire().is_some());
        pool.release(h1);
    }

    #[test]
    fn released_voice_is_unbound() {
        let mut pool = VoicePool::new(1, 64, 1);
        let (h, voice) = pool.acquire().unwrap();
        assert!(!voice.is_bound());
        pool.release(h);
        let (_, voice) = pool.acquire().unwrap();
        assert!(!voice.is_bound());
    }

    #[test]
    fn in_use_count_tracks_acquisitions() {
        let mut pool = VoicePool::new(3, 32, 1);
        assert_eq!(pool.in_use_count(), 0);
        let (h, _) = pool.acquire().unwrap();
        assert_eq!(pool.in_use_count(), 1);
        pool.release(h);
        assert_eq!(pool.in_use_count(), 0);
    }
}
