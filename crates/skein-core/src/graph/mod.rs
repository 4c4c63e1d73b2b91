//! In-memory link graph: adjacency snapshots and cycle detection.

pub mod adjacency;
pub mod cycles;

pub use adjacency::LinkGraph;
pub use cycles::{CyclePath, find_all_cycles, has_cycles, would_create_cycle};
