//! dynamis-event: lock-free SPSC ring of scene-topology events with
//! portal-event coalescing (spec.md §4.B).

mod event;
mod ring;

pub use event::TopologyEvent;
pub use ring::{event_ring, EventConsumer, EventProducer, EventRingStats};
