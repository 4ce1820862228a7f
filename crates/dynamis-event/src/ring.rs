//! Lock-free single-producer/single-consumer ring of `TopologyEvent`s with
//! portal-event coalescing.
//!
//! Each slot carries its own release-ordered sequence counter (the
//! classic Vyukov bounded-queue cell) rather than relying solely on the
//! ring's `head`/`tail` indices for synchronization. That is what makes
//! in-place coalescing sound: the producer may rewrite a slot's content
//! more than once before the consumer observes it, and every rewrite gets
//! its own release-store that the consumer's acquire-load on that same
//! slot's sequence counter synchronizes with, regardless of how stale the
//! `tail` value it used to bound its drain loop is.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dynamis_core::CoreError;

use crate::event::TopologyEvent;

struct Slot {
    data: UnsafeCell<TopologyEvent>,
    /// `0` until first published; thereafter holds `position + 1`.
    seq: AtomicU64,
}

// SAFETY: access to `data` is gated by `seq`, which is only ever mutated by
// the single producer (content writes) and observed by the single consumer
// (acquire load before reading). No two threads ever write concurrently.
unsafe impl Sync for Slot {}

struct Inner {
    slots: Box<[Slot]>,
    mask: u64,
    /// Logical (unmasked) next-write position, producer-owned.
    tail: AtomicU64,
    /// Logical (unmasked) next-read position, consumer-owned.
    head: AtomicU64,
    /// Every enqueue attempt (fresh push, coalesce, or drop) increments this.
    enqueued: AtomicU64,
    /// Events actually handed to the consumer via `drain`.
    drained: AtomicU64,
    /// Coalesced-in-place replacements (did not occupy a new slot).
    coalesced: AtomicU64,
    /// Non-coalesceable overflow: the ring was full.
    dropped: AtomicU64,
}

impl Inner {
    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }
}

/// Producer handle (game / host thread).
pub struct EventProducer {
    inner: Arc<Inner>,
    /// Producer-local cache of `tail` (sole writer, no atomic needed for
    /// this copy) plus a small table of portals with a not-yet-drained
    /// pending event, for coalescing. Producer-local per the design notes
    /// in `spec.md` §9 — no synchronization needed for this bookkeeping.
    local_tail: u64,
    pending_portal: Vec<(u32, u64)>,
}

/// Consumer handle (render thread).
pub struct EventConsumer {
    inner: Arc<Inner>,
    local_head: u64,
}

/// Snapshot of the ring's saturation counters, safe to read from any thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRingStats {
    pub enqueued: u64,
    pub drained: u64,
    pub coalesced: u64,
    pub dropped: u64,
}

/// Construct a producer/consumer pair sharing one ring. `capacity` must be a
/// power of two `>= 2` (contract violation otherwise, per spec §7).
pub fn event_ring(capacity: usize) -> Result<(EventProducer, EventConsumer), CoreError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(CoreError::RingCapacityNotPowerOfTwo(capacity));
    }
    let slots: Box<[Slot]> = (0..capacity)
        .map(|_| Slot {
            data: UnsafeCell::new(TopologyEvent::default()),
            seq: AtomicU64::new(0),
        })
        .collect();
    let inner = Arc::new(Inner {
        slots,
        mask: capacity as u64 - 1,
        tail: AtomicU64::new(0),
        head: AtomicU64::new(0),
        enqueued: AtomicU64::new(0),
        drained: AtomicU64::new(0),
        coalesced: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    Ok((
        EventProducer {
            inner: inner.clone(),
            local_tail: 0,
            pending_portal: Vec::new(),
        },
        EventConsumer {
            inner,
            local_head: 0,
        },
    ))
}

impl EventProducer {
    pub fn stats(&self) -> EventRingStats {
        stats_of(&self.inner)
    }

    pub fn enqueue_portal_state_changed(&mut self, time_ns: u64, portal_id: u32, aperture: f64) {
        self.inner.enqueued.fetch_add(1, Ordering::Relaxed);
        let event = TopologyEvent::PortalStateChanged {
            time_ns,
            portal_id,
            aperture,
        };

        let head = self.inner.head.load(Ordering::Acquire);
        self.pending_portal.retain(|&(_, pos)| pos >= head);

        if let Some(&(_, pos)) = self
            .pending_portal
            .iter()
            .find(|&&(pid, _)| pid == portal_id)
        {
            let idx = (pos & self.inner.mask) as usize;
            // SAFETY: `pos` is still within [head, local_tail), i.e. not
            // yet consumed; the producer is the sole writer of this slot.
            unsafe {
                *self.inner.slots[idx].data.get() = event;
            }
            self.inner.slots[idx].seq.store(pos + 1, Ordering::Release);
            self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if let Some(pos) = self.push_new(event) {
            self.pending_portal.push((portal_id, pos));
        }
    }

    pub fn enqueue_material_override_changed(
        &mut self,
        time_ns: u64,
        entity_id: u32,
        new_material_id: u32,
    ) {
        self.inner.enqueued.fetch_add(1, Ordering::Relaxed);
        let event = TopologyEvent::MaterialOverrideChanged {
            time_ns,
            entity_id,
            new_material_id,
        };
        self.push_new(event);
    }

    pub fn enqueue_geometry_destroyed(&mut self, time_ns: u64, geometry_id: u32) {
        self.inner.enqueued.fetch_add(1, Ordering::Relaxed);
        let event = TopologyEvent::GeometryDestroyed {
            time_ns,
            geometry_id,
        };
        self.push_new(event);
    }

    /// Returns the logical position written to, if any (`None` on drop).
    fn push_new(&mut self, event: TopologyEvent) -> Option<u64> {
        let head = self.inner.head.load(Ordering::Acquire);
        if self.local_tail - head >= self.inner.capacity() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("dynamis-event: ring full, dropping event");
            return None;
        }
        let pos = self.local_tail;
        let idx = (pos & self.inner.mask) as usize;
        unsafe {
            *self.inner.slots[idx].data.get() = event;
        }
        self.inner.slots[idx].seq.store(pos + 1, Ordering::Release);
        self.local_tail = pos + 1;
        self.inner.tail.store(self.local_tail, Ordering::Release);
        Some(pos)
    }
}

impl EventConsumer {
    pub fn stats(&self) -> EventRingStats {
        stats_of(&self.inner)
    }

    /// Number of events currently pending drain.
    pub fn pending(&self) -> usize {
        let tail = self.inner.tail.load(Ordering::Acquire);
        tail.saturating_sub(self.local_head) as usize
    }

    /// Zero-allocation drain: copies up to `min(pending, out.len())` events
    /// into `out`, returning the count written.
    pub fn drain(&mut self, out: &mut [TopologyEvent]) -> usize {
        let tail = self.inner.tail.load(Ordering::Acquire);
        let pending = tail.saturating_sub(self.local_head);
        let n = pending.min(out.len() as u64) as usize;
        for (i, slot) in out.iter_mut().enumerate().take(n) {
            let pos = self.local_head + i as u64;
            let idx = (pos & self.inner.mask) as usize;
            let expected = pos + 1;
            // The producer always publishes before advancing `tail` past
            // this position, so this should never spin in practice; the
            // wait is here purely for correctness under reordering.
            while self.inner.slots[idx].seq.load(Ordering::Acquire) != expected {
                core::hint::spin_loop();
            }
            *slot = unsafe { *self.inner.slots[idx].data.get() };
        }
        self.local_head += n as u64;
        self.inner.head.store(self.local_head, Ordering::Release);
        self.inner.drained.fetch_add(n as u64, Ordering::Relaxed);
        n
    }
}

fn stats_of(inner: &Inner) -> EventRingStats {
    EventRingStats {
        enqueued: inner.enqueued.load(Ordering::Relaxed),
        drained: inner.drained.load(Ordering::Relaxed),
        coalesced: inner.coalesced.load(Ordering::Relaxed),
        dropped: inner.dropped.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_capacity() {
        assert!(event_ring(3).is_err());
        assert!(event_ring(1).is_err());
        assert!(event_ring(16).is_ok());
    }

    /// Literal scenario from spec.md §8: coalescing collapses two portal
    /// events for the same portal into one drained event carrying the
    /// latest aperture.
    #[test]
    fn ring_coalescing_scenario() {
        let (mut p, mut c) = event_ring(16).unwrap();
        p.enqueue_portal_state_changed(0, 7, 0.2);
        p.enqueue_portal_state_changed(1, 7, 0.8);

        let mut out = [TopologyEvent::default(); 16];
        let n = c.drain(&mut out);
        assert_eq!(n, 1);
        match out[0] {
            TopologyEvent::PortalStateChanged { aperture, .. } => {
                assert!((aperture - 0.8).abs() < 1e-12)
            }
            other => panic!("unexpected event {other:?}"),
        }

        let stats = c.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.drained, 1);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn distinct_portals_do_not_coalesce() {
        let (mut p, mut c) = event_ring(4).unwrap();
        p.enqueue_portal_state_changed(0, 1, 0.1);
        p.enqueue_portal_state_changed(0, 2, 0.9);
        let mut out = [TopologyEvent::default(); 4];
        assert_eq!(c.drain(&mut out), 2);
    }

    #[test]
    fn overflow_is_counted_not_silent() {
        let (mut p, mut c) = event_ring(2).unwrap();
        // 2 distinct geometry-destroy events fill the ring; a 3rd overflows.
        p.enqueue_geometry_destroyed(0, 1);
        p.enqueue_geometry_destroyed(0, 2);
        p.enqueue_geometry_destroyed(0, 3);
        assert_eq!(p.stats().dropped, 1);
        let mut out = [TopologyEvent::default(); 2];
        assert_eq!(c.drain(&mut out), 2);
    }

    #[test]
    fn drain_resets_pending_to_zero() {
        let (mut p, mut c) = event_ring(8).unwrap();
        for i in 0..5u32 {
            p.enqueue_material_override_changed(0, i, i + 100);
        }
        assert_eq!(c.pending(), 5);
        let mut out = [TopologyEvent::default(); 8];
        let n = c.drain(&mut out);
        assert_eq!(n, 5);
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn enqueued_equals_drained_plus_dropped_plus_coalesced() {
        let (mut p, mut c) = event_ring(4).unwrap();
        p.enqueue_portal_state_changed(0, 1, 0.1); // fresh
        p.enqueue_portal_state_changed(1, 1, 0.2); // coalesced
        p.enqueue_geometry_destroyed(2, 5); // fresh
        p.enqueue_material_override_changed(3, 9, 2); // fresh
        p.enqueue_material_override_changed(4, 9, 3); // fresh (not coalesceable)
        p.enqueue_material_override_changed(5, 9, 4); // ring full -> dropped

        let mut out = [TopologyEvent::default(); 4];
        let n = c.drain(&mut out);
        let stats = c.stats();
        assert_eq!(n as u64, stats.drained);
        assert_eq!(
            stats.enqueued,
            stats.drained + stats.dropped + stats.coalesced
        );
    }
}
