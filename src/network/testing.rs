use std::sync::Mutex;

use super::system::NetworkControl;
use crate::error::NetworkCommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Scan,
    ApplyAccessPoint,
    RestoreStation,
}

/// Records calls instead of touching the OS.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    networks: Vec<String>,
    fail_scan: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeNetwork {
    pub fn with_networks(networks: &[&str]) -> Self {
        Self {
            networks: networks.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_scan() -> Self {
        Self {
            fail_scan: true,
            ..Self::default()
        }
    }

    /// Calls other than scans, in order.
    pub fn reconfigurations(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|call| *call != Call::Scan)
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NetworkControl for FakeNetwork {
    fn scan_networks(&self) -> Result<Vec<String>, NetworkCommandError> {
        self.record(Call::Scan);
        if self.fail_scan {
            return Err(NetworkCommandError::Failed {
                command: "iwlist wlan0 scan".to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(self.networks.clone())
    }

    fn apply_access_point_config(&self) -> Result<(), NetworkCommandError> {
        self.record(Call::ApplyAccessPoint);
        Ok(())
    }

    fn restore_station_config(&self) -> Result<(), NetworkCommandError> {
        self.record(Call::RestoreStation);
        Ok(())
    }
}
