//! Domain layer: the package record, its value objects, and the ports the
//! application layer depends on.

pub mod package;
pub mod ports;
