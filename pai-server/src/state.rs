//! Shared application state for the `pai-server` ambient surface.

use pai_events::Bus;
use pai_storage::{KeyValueStore, VectorStore};
use std::sync::Arc;
use std::time::Instant;

/// Handles shared across every route. `pai-server` does not own the agent
/// runtime (spec.md §1 non-goal: transport/framing of the chat channel is
/// out of scope); it only reports on the health of the storage and bus
/// dependencies those runtimes rely on.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<dyn Bus>,
    pub kv: Arc<dyn KeyValueStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        bus: Arc<dyn Bus>,
        kv: Arc<dyn KeyValueStore>,
        vectors: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            bus,
            kv,
            vectors,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
