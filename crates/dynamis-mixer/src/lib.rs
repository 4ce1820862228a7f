//! dynamis-mixer: the named bus graph, mix-snapshot blend layer, host
//! sink/asset boundaries, and the per-block render loop that ties every
//! other DynamisAudio crate together (spec.md §4.I, §4.J, §6).

mod asset;
mod bus;
mod config;
mod engine;
mod mix_snapshot;
mod sink;
mod stats;

pub use asset::{AssetFrameSource, AudioAsset, NullAudioAsset};
pub use bus::{AudioBus, BusSource, MixBusControl};
pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use engine::{Engine, EngineError, EngineHandles, MASTER_BUS_NAME, REVERB_BUS_NAME, SFX_BUS_NAME};
pub use mix_snapshot::{MixSnapshotManager, MixSnapshotRequest};
pub use sink::{AudioSink, NullAudioSink, SinkError};
pub use stats::EngineStats;
