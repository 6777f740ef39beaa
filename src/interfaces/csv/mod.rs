//! CSV command replay: rows in, package table out.

pub mod command_reader;
pub mod package_writer;
pub mod runner;
