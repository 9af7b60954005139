//! Publication rate control for history snapshots

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscriber wants to see new history snapshots.
///
/// Ingestion and assembly always run at full speed; this only limits how
/// often a render loop is woken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every published snapshot
    #[default]
    Native,

    /// At most this many snapshots per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Throttle interval, or `None` when every snapshot should be delivered.
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_intervals() {
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
        assert_eq!(UpdateRate::Max(10).throttle_interval(), Some(Duration::from_millis(100)));
    }
}
