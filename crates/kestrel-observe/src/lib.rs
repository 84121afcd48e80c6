//! Process-wide `tracing` subscriber setup for binaries and test harnesses built on kestrel.
mod logger;
pub use logger::*;
