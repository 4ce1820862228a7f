//! Topology events: the three variants the game thread publishes and the
//! render thread drains (spec §4.B).

/// A tagged scene-topology event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopologyEvent {
    /// A portal's aperture changed. Coalesceable: a later event for the
    /// same `portal_id` overwrites an earlier, not-yet-drained one.
    PortalStateChanged {
        time_ns: u64,
        portal_id: u32,
        aperture: f64,
    },
    /// An entity's material override changed.
    MaterialOverrideChanged {
        time_ns: u64,
        entity_id: u32,
        new_material_id: u32,
    },
    /// Geometry was destroyed; the render thread must clear all aperture
    /// overrides tied to it.
    GeometryDestroyed { time_ns: u64, geometry_id: u32 },
}

impl Default for TopologyEvent {
    fn default() -> Self {
        // Only ever observed as unwritten-slot filler; never produced by a
        // real enqueue call.
        TopologyEvent::GeometryDestroyed {
            time_ns: 0,
            geometry_id: 0,
        }
    }
}
