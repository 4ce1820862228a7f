//! Listener pose: position published from the game thread to every
//! emitter worker via single-word atomic writes (spec §4.F: "Listener
//! pose, sink, snapshot manager, asset are published to the emitter via
//! single-word writes"). Each coordinate commits independently; a worker
//! reading mid-update may see a torn pose for one interval, which is
//! acceptable since the next interval corrects it and nothing here drives
//! sample-accurate output.

use std::sync::atomic::Ordering;

use portable_atomic::AtomicF64;

#[derive(Default)]
pub struct ListenerPose {
    x: AtomicF64,
    y: AtomicF64,
    z: AtomicF64,
}

impl ListenerPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, position: [f64; 3]) {
        self.x.store(position[0], Ordering::Release);
        self.y.store(position[1], Ordering::Release);
        self.z.store(position[2], Ordering::Release);
    }

    pub fn position(&self) -> [f64; 3] {
        [
            self.x.load(Ordering::Acquire),
            self.y.load(Ordering::Acquire),
            self.z.load(Ordering::Acquire),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_position() {
        let pose = ListenerPose::new();
        pose.set_position([1.0, 2.0, 3.0]);
        assert_eq!(pose.position(), [1.0, 2.0, 3.0]);
    }
}
