//! dynamis-world: immutable-view scene snapshot with double-buffered
//! publish/acquire, live portal-aperture overrides, and the acoustic proxy
//! plus ray-query backends (spec.md §4.C, §4.D).

mod proxy;
mod raybackend;
mod snapshot;

pub use proxy::{build_proxy_from_mesh, AcousticProxy, MeshSurface, MeshSurfaceSource, Triangle};
pub use raybackend::{BruteForceRayBackend, RayBackend};
pub use snapshot::{WorldSnapshot, WorldSnapshotManager};
