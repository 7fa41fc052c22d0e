//! Snapshot persistence policy
//!
//! High-frequency stroke events must not each produce a database write. The
//! policy is an explicit debounce: a `draw` operation persists only when the
//! canvas has not been persisted within the configured interval; every other
//! operation (clear, undo, redo, shape commits) persists unconditionally.
//!
//! The durable snapshot may therefore lag behind the live collaborative
//! state; clients joining mid-session receive the last persisted snapshot
//! and catch up from live broadcasts.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Operation name for freehand stroke events, the only debounced kind
pub const DRAW_OPERATION: &str = "draw";

/// Default minimum interval between persisted draw snapshots per canvas
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 2000;

/// Debounce policy deciding which canvas updates reach the durable store
pub struct SnapshotPolicy {
    min_interval: Duration,
    last_persist: Mutex<HashMap<String, Instant>>,
}

impl SnapshotPolicy {
    /// Create a policy with the default interval
    #[must_use]
    pub fn new() -> Self {
        Self::with_min_interval(Duration::from_millis(DEFAULT_MIN_INTERVAL_MS))
    }

    /// Create a policy with a specific minimum interval
    #[must_use]
    pub fn with_min_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_persist: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether this update should be persisted, recording the
    /// decision so subsequent draw events within the interval are skipped.
    pub async fn should_persist(&self, canvas_id: &str, operation: &str) -> bool {
        let now = Instant::now();
        let mut last = self.last_persist.lock().await;

        if operation != DRAW_OPERATION {
            last.insert(canvas_id.to_string(), now);
            return true;
        }

        match last.get(canvas_id) {
            Some(previous) if now.duration_since(*previous) < self.min_interval => false,
            _ => {
                last.insert(canvas_id.to_string(), now);
                true
            }
        }
    }

    /// Forget a canvas, e.g. when its room empties
    pub async fn forget(&self, canvas_id: &str) {
        let mut last = self.last_persist.lock().await;
        last.remove(canvas_id);
    }
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::new()
    }
}
