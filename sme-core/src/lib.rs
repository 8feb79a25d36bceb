#![no_std]

// Host-side command engine for a WiFi station-management layer.
//
// This crate stays portable across embedded targets and host tooling by
// avoiding the Rust standard library; hosts supply timestamps, the
// serialization scheduler, and the dispatch sink through the trait seams.

pub mod command;
pub mod dispatch;
pub mod engine;
pub mod fault;
pub mod pool;
pub mod response;
pub mod serializer;
pub mod shell;
pub mod telemetry;
