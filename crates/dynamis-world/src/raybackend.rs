//! Ray-query backends: the `RayBackend` capability trait plus the
//! brute-force Möller–Trumbore triangle backend (spec §4.D).
//!
//! A physics-backed backend implements the same trait; the only contract
//! it must additionally uphold is the physics-mesh-to-proxy ordering rule
//! (spec §6): the triangle index a physics hit reports must equal the
//! proxy's triangle index for the same surface. Nothing in this crate can
//! check that mechanically — it is a build-time pairing concern between
//! the host's mesh iterator and its physics backend.

use dynamis_core::{AcousticHit, HitBuffer, SurfaceType};

use crate::proxy::Triangle;
use crate::snapshot::WorldSnapshot;

/// Epsilon gate for the Möller–Trumbore parallel-ray test.
const MT_EPSILON: f64 = 1e-9;

/// Pluggable ray-query capability. Backend absence at the snapshot means
/// "miss" (spec §7, Scene absence) — callers never see an error for this.
pub trait RayBackend: Send + Sync {
    /// Single nearest hit along `origin + t*dir`, `t` in `[0, max_distance]`.
    fn trace_ray(
        &self,
        snapshot: &WorldSnapshot,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut AcousticHit,
    );

    /// All hits along the ray, nearest-first, up to the buffer's capacity.
    fn trace_ray_multi(
        &self,
        snapshot: &WorldSnapshot,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut HitBuffer,
    );
}

/// Brute-force triangle backend: iterates every triangle in the installed
/// proxy, intersecting with Möller–Trumbore. O(triangle count) per ray;
/// adequate for the small in-memory proxies this engine targets (the spec
/// calls out a physics-backed backend as the production path for large
/// scenes).
#[derive(Debug, Default, Clone, Copy)]
pub struct BruteForceRayBackend;

#[inline]
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Möller–Trumbore ray/triangle intersection. Returns the hit distance `t`
/// if the ray hits within `(epsilon, max_distance]`.
fn intersect(tri: &Triangle, origin: [f64; 3], dir: [f64; 3], max_distance: f64) -> Option<f64> {
    let edge1 = sub(tri.v1, tri.v0);
    let edge2 = sub(tri.v2, tri.v0);
    let pvec = cross(dir, edge2);
    let det = dot(edge1, pvec);
    if det.abs() < MT_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = sub(origin, tri.v0);
    let u = dot(tvec, pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = cross(tvec, edge1);
    let v = dot(dir, qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = dot(edge2, qvec) * inv_det;
    if t > MT_EPSILON && t <= max_distance {
        Some(t)
    } else {
        None
    }
}

fn hit_from_triangle(tri: &Triangle, t: f64, snapshot: &WorldSnapshot) -> AcousticHit {
    let portal_aperture = if tri.surface_type == SurfaceType::Portal {
        snapshot.portal_aperture(tri.portal_id)
    } else {
        1.0
    };
    AcousticHit {
        hit: true,
        distance: t,
        normal: tri.normal(),
        material_id: tri.material_id,
        portal_id: tri.portal_id,
        room_id: tri.room_id,
        portal_aperture,
        is_room_boundary: tri.surface_type == SurfaceType::RoomBoundary,
    }
}

impl RayBackend for BruteForceRayBackend {
    fn trace_ray(
        &self,
        snapshot: &WorldSnapshot,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut AcousticHit,
    ) {
        *out = AcousticHit::MISS;
        let Some(proxy) = snapshot.proxy() else {
            return;
        };
        let mut best_t = f64::INFINITY;
        let mut best_tri: Option<&Triangle> = None;
        for tri in proxy.triangles() {
            if let Some(t) = intersect(tri, origin, dir, max_distance) {
                if t < best_t {
                    best_t = t;
                    best_tri = Some(tri);
                }
            }
        }
        if let Some(tri) = best_tri {
            *out = hit_from_triangle(tri, best_t, snapshot);
        }
    }

    fn trace_ray_multi(
        &self,
        snapshot: &WorldSnapshot,
        origin: [f64; 3],
        dir: [f64; 3],
        max_distance: f64,
        out: &mut HitBuffer,
    ) {
        out.clear();
        let Some(proxy) = snapshot.proxy() else {
            return;
        };
        for tri in proxy.triangles() {
            if let Some(t) = intersect(tri, origin, dir, max_distance) {
                out.insert_sorted(hit_from_triangle(tri, t, snapshot));
            }
        }
    }
}
