//! Append-only run log sinks.
//!
//! Every component receives an `Arc<dyn LogSink>` at construction instead of
//! writing to a module-wide logger. A run uses one sink (usually a
//! [`TeeLogSink`] over tracing and the summary file); writes are never
//! concurrent because topics run sequentially.

mod sink;

pub use sink::{
    CollectingLogSink, FileLogSink, LogSink, NoOpLogSink, TeeLogSink, TracingLogSink,
};
