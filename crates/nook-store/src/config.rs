use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the [`KeyedStore`](crate::KeyedStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Simulated latency awaited at every read and write boundary, in
    /// milliseconds. `0` still yields to the scheduler.
    pub latency_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { latency_ms: 0 }
    }
}

impl StoreConfig {
    /// A configuration with the given simulated latency.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
