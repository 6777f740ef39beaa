use crate::domain::package::{PackageStatus, PaymentStatus, UserPackage};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Flat view of a package written to the output table.
#[derive(Debug, Serialize, PartialEq)]
pub struct PackageRow {
    pub package: u64,
    pub user: u64,
    pub plan: u64,
    pub credits: u32,
    pub amount: Decimal,
    pub status: PackageStatus,
    pub payment: PaymentStatus,
    pub version: u64,
    pub attempts: u32,
}

impl From<&UserPackage> for PackageRow {
    fn from(package: &UserPackage) -> Self {
        Self {
            package: package.id.0,
            user: package.user.0,
            plan: package.plan.0,
            credits: package.credits_remaining.value(),
            amount: package.amount.value().normalize(),
            status: package.status,
            payment: package.payment_status,
            version: package.version,
            attempts: package.approval_attempt_count,
        }
    }
}

/// Writes packages as CSV with a header row.
pub struct PackageWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PackageWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_packages<I>(&mut self, packages: I) -> Result<()>
    where
        I: IntoIterator<Item = UserPackage>,
    {
        for package in packages {
            self.writer.serialize(PackageRow::from(&package))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
