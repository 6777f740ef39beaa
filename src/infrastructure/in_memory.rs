use crate::domain::package::{PackageId, PaymentStatus, UserPackage};
use crate::domain::ports::PackageStore;
use crate::error::{PackageError, Result, TransitionError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for packages.
///
/// The version check and the write of `compare_and_swap` happen under one
/// write guard, which is what makes the swap atomic for concurrent callers.
/// Ordered by id so listings are stable.
#[derive(Default, Clone)]
pub struct InMemoryPackageStore {
    packages: Arc<RwLock<BTreeMap<PackageId, UserPackage>>>,
}

impl InMemoryPackageStore {
    /// Creates a new, empty in-memory package store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    async fn insert(&self, package: UserPackage) -> Result<()> {
        let mut packages = self.packages.write().await;
        if packages.contains_key(&package.id) {
            return Err(PackageError::AlreadyExists(package.id));
        }
        packages.insert(package.id, package);
        Ok(())
    }

    async fn get(&self, id: PackageId) -> Result<Option<UserPackage>> {
        let packages = self.packages.read().await;
        Ok(packages.get(&id).cloned())
    }

    async fn compare_and_swap(&self, expected_version: u64, package: UserPackage) -> Result<()> {
        let mut packages = self.packages.write().await;
        let stored = packages
            .get_mut(&package.id)
            .ok_or(PackageError::NotFound(package.id))?;

        if stored.version != expected_version {
            return Err(TransitionError::ConcurrencyConflict {
                expected: expected_version,
                actual: stored.version,
            }
            .into());
        }

        *stored = package;
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<UserPackage>> {
        let packages = self.packages.read().await;
        Ok(packages
            .values()
            .filter(|p| p.payment_status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<UserPackage>> {
        let packages = self.packages.read().await;
        Ok(packages.values().cloned().collect())
    }
}
