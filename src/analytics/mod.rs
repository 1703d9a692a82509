//! Click telemetry: buffered counters and append-only click events.
//!
//! Recording is fire-and-forget from the resolver's perspective; the
//! redirect response never waits on it.

pub mod recorder;
pub mod sink;

pub use recorder::ClickRecorder;
pub use sink::{ClickSink, StorageSink};
