//! World snapshot and manager: a double-buffered, immutable-view scene
//! plus live portal-aperture overrides (spec §4.C).
//!
//! Mutation is game-thread-only; the render thread reads a single front
//! buffer for the duration of one block and additionally carries a
//! render-thread-owned override map for portal apertures, applied during
//! event drain directly on the back buffer before publish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;

use dynamis_core::{CoreError, CoreResult, Material, Portal, Room};

use crate::proxy::AcousticProxy;
use crate::raybackend::RayBackend;

/// One mutable scene snapshot: rooms, materials, portals, portal aperture
/// overrides, proxy, and the installed ray backend.
#[derive(Default, Clone)]
struct SceneState {
    rooms: HashMap<u32, Room>,
    materials: HashMap<u32, Material>,
    portals: HashMap<u32, Portal>,
    /// Live overrides applied by the render thread during event drain;
    /// read-through falls back to the portal's own aperture, then 1.0.
    portal_aperture_overrides: HashMap<u32, f64>,
    proxy: Option<Arc<AcousticProxy>>,
    ray_backend: Option<Arc<dyn RayBackend>>,
    version: u64,
    timestamp_ns: u128,
}

impl SceneState {
    fn portal_aperture(&self, portal_id: u32) -> f64 {
        if let Some(&a) = self.portal_aperture_overrides.get(&portal_id) {
            return a;
        }
        self.portals
            .get(&portal_id)
            .map(|p| p.aperture())
            .unwrap_or(Portal::DEFAULT_APERTURE)
    }
}

/// Double-buffered world snapshot manager. The game thread mutates through
/// `&mut` accessors on the back buffer; `publish` flips `front_index` with
/// release ordering so the render thread's next acquire-load observes a
/// fully-written buffer.
pub struct WorldSnapshotManager {
    buffers: [ArcSwap<SceneState>; 2],
    /// 0 or 1: index of the buffer readers should acquire.
    front_index: AtomicUsize,
}

impl Default for WorldSnapshotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldSnapshotManager {
    pub fn new() -> Self {
        Self {
            buffers: [
                ArcSwap::from_pointee(SceneState::default()),
                ArcSwap::from_pointee(SceneState::default()),
            ],
            front_index: AtomicUsize::new(0),
        }
    }

    /// Borrow the current front buffer for exactly one render block. The
    /// returned guard must not escape the block that acquired it.
    pub fn acquire(&self) -> WorldSnapshot {
        let idx = self.front_index.load(Ordering::Acquire);
        let state = self.buffers[idx].load_full();
        WorldSnapshot { state }
    }

    /// Back-buffer index, i.e. the one the game thread mutates next.
    fn back_index(&self) -> usize {
        1 - self.front_index.load(Ordering::Relaxed)
    }

    fn with_back_mut<R>(&self, f: impl FnOnce(&mut SceneState) -> R) -> R {
        let idx = self.back_index();
        let mut state = (*self.buffers[idx].load_full()).clone();
        let result = f(&mut state);
        self.buffers[idx].store(Arc::new(state));
        result
    }

    pub fn put_room(&self, room: Room) {
        self.with_back_mut(|s| {
            s.rooms.insert(room.room_id(), room);
        });
    }

    pub fn put_material(&self, material: Material) {
        self.with_back_mut(|s| {
            s.materials.insert(material.material_id(), material);
        });
    }

    pub fn put_portal(&self, portal: Portal) {
        self.with_back_mut(|s| {
            s.portals.insert(portal.portal_id(), portal);
        });
    }

    pub fn remove_room(&self, room_id: u32) {
        self.with_back_mut(|s| {
            s.rooms.remove(&room_id);
        });
    }

    pub fn remove_material(&self, material_id: u32) {
        self.with_back_mut(|s| {
            s.materials.remove(&material_id);
        });
    }

    pub fn remove_portal(&self, portal_id: u32) {
        self.with_back_mut(|s| {
            s.portals.remove(&portal_id);
            s.portal_aperture_overrides.remove(&portal_id);
        });
    }

    pub fn clear(&self) {
        self.with_back_mut(|s| {
            s.rooms.clear();
            s.materials.clear();
            s.portals.clear();
            s.portal_aperture_overrides.clear();
        });
    }

    pub fn set_ray_backend(&self, backend: Arc<dyn RayBackend>) {
        self.with_back_mut(|s| {
            s.ray_backend = Some(backend);
        });
    }

    pub fn set_proxy(&self, proxy: Arc<AcousticProxy>) {
        self.with_back_mut(|s| {
            s.proxy = Some(proxy);
        });
    }

    /// Render-thread call during event drain: overrides a portal's live
    /// aperture on the back buffer without touching its definition.
    pub fn set_portal_aperture(&self, portal_id: u32, aperture: f64) {
        self.with_back_mut(|s| {
            s.portal_aperture_overrides
                .insert(portal_id, aperture.clamp(0.0, 1.0));
        });
    }

    /// Clears every live aperture override; called on `GeometryDestroyed`.
    pub fn clear_portal_aperture_overrides(&self) {
        self.with_back_mut(|s| {
            s.portal_aperture_overrides.clear();
        });
    }

    /// Stamps the back buffer with a monotonically increasing version and
    /// the current timestamp, then flips `front_index` with release
    /// ordering.
    pub fn publish(&self) {
        let back = self.back_index();
        let next_version = {
            let cur = self.buffers[back].load();
            cur.as_ref().map(|s| s.version).unwrap_or(0) + 1
        };
        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.with_back_mut(|s| {
            s.version = next_version;
            s.timestamp_ns = now_ns;
        });
        self.front_index.store(back, Ordering::Release);
    }

    pub fn current_version(&self) -> u64 {
        self.acquire().version()
    }
}

/// Borrowed, immutable view of the scene for exactly one render block.
pub struct WorldSnapshot {
    state: Arc<SceneState>,
}

impl WorldSnapshot {
    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn timestamp_ns(&self) -> u128 {
        self.state.timestamp_ns
    }

    pub fn room(&self, room_id: u32) -> Option<&Room> {
        self.state.rooms.get(&room_id)
    }

    pub fn material(&self, material_id: u32) -> Option<&Material> {
        self.state.materials.get(&material_id)
    }

    pub fn portal(&self, portal_id: u32) -> Option<&Portal> {
        self.state.portals.get(&portal_id)
    }

    pub fn portals(&self) -> impl Iterator<Item = &Portal> {
        self.state.portals.values()
    }

    /// Read-through: override → portal definition aperture → 1.0 if unknown
    /// (spec §4.C).
    pub fn portal_aperture(&self, portal_id: u32) -> f64 {
        self.state.portal_aperture(portal_id)
    }

    pub fn proxy(&self) -> Option<&Arc<AcousticProxy>> {
        self.state.proxy.as_ref()
    }

    /// Resets `out` and delegates to the installed ray backend. Backend
    /// absence means "miss" — no error surfaced (spec §7, Scene absence).
    pub fn trace_ray(
        &self,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut dynamis_core::AcousticHit,
    ) {
        *out = dynamis_core::AcousticHit::MISS;
        if let Some(backend) = &self.state.ray_backend {
            backend.trace_ray(self, origin, dir, max_distance, out);
        }
    }

    pub fn trace_ray_multi(
        &self,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut dynamis_core::HitBuffer,
    ) -> usize {
        out.clear();
        if let Some(backend) = &self.state.ray_backend {
            backend.trace_ray_multi(self, origin, dir, max_distance, out);
        }
        out.len()
    }
}

/// Construction-time check used by `dynamis-mixer`'s `EngineConfig`: the
/// event-ring capacity power-of-two rule lives in `dynamis-event`, but a
/// handful of scene-level contract violations (materials/rooms/portals
/// built with invalid band arrays) are caught at their own `try_new` sites
/// in `dynamis-core`; this function exists purely so callers assembling a
/// scene from host data in one pass can bail on the first error.
pub fn validate_finite(label: &'static str, value: f64) -> CoreResult<()> {
    if !value.is_finite() {
        return Err(CoreError::NonFinite { field: label, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamis_core::ZERO_BANDS;

    #[test]
    fn version_is_strictly_monotonic_across_publish() {
        let mgr = WorldSnapshotManager::new();
        let v0 = mgr.acquire().version();
        mgr.publish();
        let v1 = mgr.acquire().version();
        mgr.publish();
        let v2 = mgr.acquire().version();
        assert!(v1 > v0);
        assert!(v2 > v1);
    }

    #[test]
    fn portal_aperture_read_through_default() {
        let mgr = WorldSnapshotManager::new();
        mgr.publish();
        assert_eq!(mgr.acquire().portal_aperture(999), 1.0);
    }

    #[test]
    fn portal_aperture_override_shadows_definition() {
        let mgr = WorldSnapshotManager::new();
        let portal = Portal::try_new(7, 1, 2, 0.2, ZERO_BANDS).unwrap();
        mgr.put_portal(portal);
        mgr.publish();
        mgr.set_portal_aperture(7, 0.9);
        mgr.publish();
        assert!((mgr.acquire().portal_aperture(7) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn clear_overrides_restores_definition_aperture() {
        let mgr = WorldSnapshotManager::new();
        let portal = Portal::try_new(7, 1, 2, 0.2, ZERO_BANDS).unwrap();
        mgr.put_portal(portal);
        mgr.set_portal_aperture(7, 0.9);
        mgr.publish();
        mgr.clear_portal_aperture_overrides();
        mgr.publish();
        assert!((mgr.acquire().portal_aperture(7) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn mutation_before_publish_is_invisible_to_readers() {
        let mgr = WorldSnapshotManager::new();
        mgr.publish();
        let before = mgr.acquire();
        mgr.put_room(Room::try_new(1, 10.0, 10.0, ZERO_BANDS, 0).unwrap());
        assert!(before.room(1).is_none());
        mgr.publish();
        assert!(mgr.acquire().room(1).is_some());
    }
}
