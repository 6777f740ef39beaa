//! Payment approval and credit lifecycle for purchased studio class packages.
//!
//! A package is bought with its payment PENDING, and an admin then confirms
//! or rejects it. A sweep rejects it automatically once the approval deadline
//! passes. Every change is a compare-and-swap on the record's version, so
//! racing admins and the sweep can never both win.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
