//! Artifact synchronization engine: resilient parsers for planning
//! artifacts (sprint status, epics, stories), a debounced change watcher,
//! a stateful aggregator that owns the merged snapshot, and a pure
//! recommendation engine over it.

pub mod aggregator;
pub mod error;
pub mod io;
pub mod parse;
pub mod paths;
pub mod recommend;
pub mod snapshot;
pub mod types;
pub mod watcher;

pub use error::{PlansyncError, Result};
