use crate::error::{PackageError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Purchase,
    Approve,
    Reject,
    Consume,
    Restore,
    Cancel,
    Sweep,
}

/// One row of a command file.
///
/// Columns not used by a command type are left empty. `at` is the moment
/// the command happens; commands are replayed at that time.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub r#type: CommandType,
    pub package: Option<u64>,
    pub user: Option<u64>,
    pub plan: Option<u64>,
    pub credits: Option<u32>,
    pub amount: Option<Decimal>,
    pub actor: Option<u64>,
    pub version: Option<u64>,
    pub key: Option<String>,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl Command {
    /// Returns a field the command type needs, or a validation error naming it.
    pub fn required<T: Clone>(&self, field: &Option<T>, name: &str) -> Result<T> {
        field.clone().ok_or_else(|| {
            PackageError::ValidationError(format!(
                "{:?} command is missing `{}`",
                self.r#type, name
            ))
        })
    }
}

/// Reads commands from a CSV source.
///
/// Whitespace around fields is trimmed and rows may omit trailing columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands, one `Result` per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PackageError::from))
    }
}
