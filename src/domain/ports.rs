use super::package::{PackageId, UserPackage};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence for package records.
///
/// `compare_and_swap` must be atomic against concurrent writers on the same
/// record: it writes `package` only while the stored version still equals
/// `expected_version`, and otherwise fails with
/// `TransitionError::ConcurrencyConflict` without touching the row.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Stores a freshly purchased package. Fails if the id is taken.
    async fn insert(&self, package: UserPackage) -> Result<()>;
    async fn get(&self, id: PackageId) -> Result<Option<UserPackage>>;
    async fn compare_and_swap(&self, expected_version: u64, package: UserPackage) -> Result<()>;
    /// Packages whose payment is still pending.
    async fn pending(&self) -> Result<Vec<UserPackage>>;
    async fn get_all(&self) -> Result<Vec<UserPackage>>;
}

pub type PackageStoreBox = Box<dyn PackageStore>;

/// Source of "now" for deadline and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockRef = Arc<dyn Clock>;
