#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Arc;
use studio_credits::application::engine::PackageApprovalEngine;
use studio_credits::application::service::ApprovalService;
use studio_credits::config::ApprovalConfig;
use studio_credits::domain::package::{NewPackage, PackageId, PlanId, UserId, UserPackage};
use studio_credits::infrastructure::clock::ManualClock;
use studio_credits::infrastructure::in_memory::InMemoryPackageStore;
use tempfile::NamedTempFile;

pub const HEADER: &str = "type,package,user,plan,credits,amount,actor,version,key,reason,at";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn new_package(id: u64) -> NewPackage {
    NewPackage {
        id: PackageId(id),
        user: UserId(100 + id),
        plan: PlanId(1),
        credits: 10,
        amount: dec!(120.00),
    }
}

/// A freshly purchased package: `{version: 1, payment: pending}`.
pub fn pending_package(id: u64) -> UserPackage {
    UserPackage::purchase(new_package(id), start(), &ApprovalConfig::default()).unwrap()
}

pub fn engine() -> (Arc<ManualClock>, PackageApprovalEngine) {
    let clock = Arc::new(ManualClock::new(start()));
    (clock.clone(), PackageApprovalEngine::new(clock))
}

pub fn service() -> (Arc<ManualClock>, Arc<ApprovalService>) {
    let clock = Arc::new(ManualClock::new(start()));
    let service = ApprovalService::new(
        Box::new(InMemoryPackageStore::new()),
        clock.clone(),
        ApprovalConfig::default(),
    );
    (clock, Arc::new(service))
}

/// Writes `rows` under the command header into a temp file.
pub fn command_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}
