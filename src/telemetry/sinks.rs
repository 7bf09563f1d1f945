//! Concrete telemetry sinks.

pub mod fanout;
pub mod journal;
pub mod memory;
pub mod trace;

pub use fanout::FanoutSink;
pub use journal::TelemetryJournal;
pub use memory::MemorySink;
pub use trace::TracingSink;
