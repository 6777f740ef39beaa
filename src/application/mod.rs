//! Application layer containing the package approval logic and its orchestration.
//!
//! `engine` is the pure state machine, `service` runs it against a
//! `PackageStore` with compare-and-swap writes, and `sweeper` drives the
//! deadline sweep on a timer.

pub mod engine;
pub mod service;
pub mod sweeper;
