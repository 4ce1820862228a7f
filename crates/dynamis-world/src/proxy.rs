//! Immutable acoustic proxy: a vector of triangles tagged with material,
//! portal and room identity, built once from a host mesh iterator and a
//! mesh-tagger callback (spec §4.D, §6).

use dynamis_core::{CoreError, CoreResult, SurfaceType};

/// A single proxy triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: [f64; 3],
    pub v1: [f64; 3],
    pub v2: [f64; 3],
    pub material_id: u32,
    pub portal_id: u32,
    pub room_id: u32,
    pub surface_type: SurfaceType,
}

fn finite3(v: [f64; 3]) -> bool {
    v.iter().all(|c| c.is_finite())
}

impl Triangle {
    fn validate(&self) -> CoreResult<()> {
        if !(finite3(self.v0) && finite3(self.v1) && finite3(self.v2)) {
            return Err(CoreError::NonFinite {
                field: "triangle vertex",
                value: f64::NAN,
            });
        }
        if self.surface_type == SurfaceType::Portal && self.portal_id == 0 {
            return Err(CoreError::PortalIdZero { portal_id: 0 });
        }
        Ok(())
    }

    /// Geometric normal, normalized. Degenerate triangles yield a zero
    /// vector (guarded by the caller before use).
    pub fn normal(&self) -> [f64; 3] {
        let e1 = sub(self.v1, self.v0);
        let e2 = sub(self.v2, self.v0);
        let n = cross(e1, e2);
        normalize(n)
    }
}

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
fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 1e-12 {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Immutable triangle proxy. Once built it never changes; scene edits
/// rebuild a new proxy and swap it into the installed ray backend.
#[derive(Debug, Clone)]
pub struct AcousticProxy {
    triangles: Vec<Triangle>,
}

impl AcousticProxy {
    pub fn try_from_triangles(triangles: Vec<Triangle>) -> CoreResult<Self> {
        for t in &triangles {
            t.validate()?;
        }
        Ok(Self { triangles })
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn portal_triangles_in_room(&self, room_id: u32) -> impl Iterator<Item = &Triangle> {
        self.triangles
            .iter()
            .filter(move |t| t.surface_type == SurfaceType::Portal && t.room_id == room_id)
    }
}

/// A tagged mesh surface returned by the host's mesh-tagger callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshSurface {
    pub v0: [f64; 3],
    pub v1: [f64; 3],
    pub v2: [f64; 3],
    pub material_id: u32,
    pub portal_id: u32,
    pub room_id: u32,
    pub is_portal: bool,
    pub is_room_boundary: bool,
}

/// Host capability: iterate every triangle of a body's mesh, in the exact
/// order the physics ray backend will later index them (spec §6's
/// "physics-mesh-to-proxy ordering contract").
pub trait MeshSurfaceSource {
    fn for_each_triangle(
        &self,
        visit: &mut dyn FnMut(u64, usize, [f64; 3], [f64; 3], [f64; 3]),
    );
}

/// Build a proxy from a host mesh iterator plus a tagger callback. Rejects a
/// PORTAL-tagged surface with `portal_id == 0` (spec §6).
pub fn build_proxy_from_mesh(
    source: &dyn MeshSurfaceSource,
    tagger: &dyn Fn(u64, usize, [f64; 3], [f64; 3], [f64; 3]) -> Option<MeshSurface>,
) -> CoreResult<AcousticProxy> {
    let mut triangles = Vec::new();
    let mut first_error: Option<CoreError> = None;

    source.for_each_triangle(&mut |body_id, tri_index, v0, v1, v2| {
        if first_error.is_some() {
            return;
        }
        let Some(surface) = tagger(body_id, tri_index, v0, v1, v2) else {
            return;
        };
        let surface_type = if surface.is_portal {
            SurfaceType::Portal
        } else if surface.is_room_boundary {
            SurfaceType::RoomBoundary
        } else {
            SurfaceType::Ordinary
        };
        if surface_type == SurfaceType::Portal && surface.portal_id == 0 {
            first_error = Some(CoreError::PortalIdZero { portal_id: 0 });
            return;
        }
        triangles.push(Triangle {
            v0: surface.v0,
            v1: surface.v1,
            v2: surface.v2,
            material_id: surface.material_id,
            portal_id: surface.portal_id,
            room_id: surface.room_id,
            surface_type,
        });
    });

    if let Some(err) = first_error {
        return Err(err);
    }
    AcousticProxy::try_from_triangles(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_portal_with_zero_id() {
        let tri = Triangle {
            v0: [0.0, 0.0, 0.0],
            v1: [1.0, 0.0, 0.0],
            v2: [0.0, 1.0, 0.0],
            material_id: 1,
            portal_id: 0,
            room_id: 1,
            surface_type: SurfaceType::Portal,
        };
        assert!(AcousticProxy::try_from_triangles(vec![tri]).is_err());
    }

    #[test]
    fn rejects_non_finite_vertex() {
        let tri = Triangle {
            v0: [f64::NAN, 0.0, 0.0],
            v1: [1.0, 0.0, 0.0],
            v2: [0.0, 1.0, 0.0],
            material_id: 1,
            portal_id: 0,
            room_id: 1,
            surface_type: SurfaceType::Ordinary,
        };
        assert!(AcousticProxy::try_from_triangles(vec![tri]).is_err());
    }
}
