use std::sync::{Mutex, MutexGuard, PoisonError};

use common::MeasurementReport;
use log::debug;

/// One consistent set of readings, in grams.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MeasurementSnapshot {
    pub current_weight: f32,
    pub container_weight: f32,
    pub net_weight: f32,
}

impl MeasurementSnapshot {
    fn new(current_weight: f32, container_weight: f32) -> Self {
        Self {
            current_weight,
            container_weight,
            net_weight: current_weight - container_weight,
        }
    }
}

impl From<MeasurementSnapshot> for MeasurementReport {
    fn from(snapshot: MeasurementSnapshot) -> Self {
        MeasurementReport::from_grams(
            snapshot.current_weight,
            snapshot.container_weight,
            snapshot.net_weight,
        )
    }
}

/// The live reading shared between the sampler and the network service.
///
/// Every operation swaps the whole snapshot under one lock, so a reader
/// never sees a net weight computed from a different current or container
/// weight than the ones beside it.
#[derive(Debug, Default)]
pub struct MeasurementState {
    snapshot: Mutex<MeasurementSnapshot>,
}

impl MeasurementState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, weight: f32) {
        let mut snapshot = self.lock();
        *snapshot = MeasurementSnapshot::new(weight, snapshot.container_weight);
        debug!("Published {:?}", *snapshot);
    }

    pub fn read(&self) -> MeasurementSnapshot {
        *self.lock()
    }

    pub fn set_container_weight(&self, weight: f32) {
        let mut snapshot = self.lock();
        *snapshot = MeasurementSnapshot::new(snapshot.current_weight, weight);
    }

    pub fn reset_container_weight(&self) {
        self.set_container_weight(0.0);
    }

    // The guarded value is plain data, always whole, so a panic elsewhere
    // cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, MeasurementSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_publish_computes_net() {
        let state = MeasurementState::new();
        state.set_container_weight(120.0);
        state.publish(300.5);

        assert_eq!(
            state.read(),
            MeasurementSnapshot {
                current_weight: 300.5,
                container_weight: 120.0,
                net_weight: 300.5 - 120.0,
            }
        );
    }

    #[test]
    fn test_container_change_keeps_net_consistent() {
        let state = MeasurementState::new();
        state.publish(50.0);
        state.set_container_weight(20.0);

        let snapshot = state.read();
        assert_eq!(snapshot.current_weight, 50.0);
        assert_eq!(snapshot.net_weight, 30.0);
    }

    #[test]
    fn test_reset_container_is_idempotent() {
        let state = MeasurementState::new();
        state.set_container_weight(80.0);
        state.publish(200.0);

        state.reset_container_weight();
        let once = state.read();
        state.reset_container_weight();

        assert_eq!(state.read(), once);
        assert_eq!(once.container_weight, 0.0);
        assert_eq!(once.net_weight, 200.0);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_snapshots() {
        let state = Arc::new(MeasurementState::new());

        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 0..5_000 {
                    state.publish(i as f32);
                    if i % 7 == 0 {
                        state.set_container_weight((i % 100) as f32);
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        let s = state.read();
                        assert_eq!(s.net_weight, s.current_weight - s.container_weight);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_report_conversion() {
        let state = MeasurementState::new();
        state.set_container_weight(10.0);
        state.publish(110.0);

        let report = MeasurementReport::from(state.read());
        assert_eq!(report.measured_weight_g, 110.0);
        assert_eq!(report.container_weight_g, 10.0);
        assert_eq!(report.fluid_weight_g, 100.0);
    }
}
