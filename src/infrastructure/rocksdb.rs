use crate::domain::package::{PackageId, PaymentStatus, UserPackage};
use crate::domain::ports::PackageStore;
use crate::error::{PackageError, Result, TransitionError};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, OptimisticTransactionDB,
    Options,
};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing package records.
pub const CF_PACKAGES: &str = "packages";

/// A persistent package store backed by RocksDB.
///
/// Writes go through optimistic transactions: the stored version is read
/// with `get_for_update`, so a concurrent commit on the same key makes ours
/// fail with `Busy`, which surfaces as a `ConcurrencyConflict`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<OptimisticTransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_packages = ColumnFamilyDescriptor::new(CF_PACKAGES, Options::default());
        let db: OptimisticTransactionDB =
            OptimisticTransactionDB::open_cf_descriptors(&opts, path, vec![cf_packages])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn packages(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_PACKAGES).ok_or_else(|| {
            PackageError::InternalError(Box::new(std::io::Error::other(
                "Packages column family not found",
            )))
        })
    }

    fn decode(bytes: &[u8]) -> Result<UserPackage> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn stored_version(&self, id: PackageId) -> Result<u64> {
        let bytes = self
            .db
            .get_cf(self.packages()?, id.0.to_be_bytes())?
            .ok_or(PackageError::NotFound(id))?;
        Ok(Self::decode(&bytes)?.version)
    }

    /// Maps a failed commit. A write conflict re-reads the row so the
    /// reported `actual` version is the one that won.
    fn commit_error(&self, e: rocksdb::Error, id: PackageId, expected_version: u64) -> PackageError {
        match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => match self.stored_version(id) {
                Ok(actual) => TransitionError::ConcurrencyConflict {
                    expected: expected_version,
                    actual,
                }
                .into(),
                Err(err) => err,
            },
            _ => {
                tracing::error!(package = %id, error = %e, "RocksDB commit failed");
                e.into()
            }
        }
    }
}

#[async_trait]
impl PackageStore for RocksDBStore {
    async fn insert(&self, package: UserPackage) -> Result<()> {
        let cf = self.packages()?;
        let key = package.id.0.to_be_bytes();
        let value = serde_json::to_vec(&package)?;

        let txn = self.db.transaction();
        if txn.get_for_update_cf(cf, key, true)?.is_some() {
            return Err(PackageError::AlreadyExists(package.id));
        }
        txn.put_cf(cf, key, value)?;
        txn.commit()
            .map_err(|e| match e.kind() {
                ErrorKind::Busy | ErrorKind::TryAgain => PackageError::AlreadyExists(package.id),
                _ => e.into(),
            })
    }

    async fn get(&self, id: PackageId) -> Result<Option<UserPackage>> {
        let cf = self.packages()?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn compare_and_swap(&self, expected_version: u64, package: UserPackage) -> Result<()> {
        let cf = self.packages()?;
        let key = package.id.0.to_be_bytes();

        let txn = self.db.transaction();
        let stored = txn
            .get_for_update_cf(cf, key, true)?
            .ok_or(PackageError::NotFound(package.id))?;
        let stored = Self::decode(&stored)?;
        if stored.version != expected_version {
            return Err(TransitionError::ConcurrencyConflict {
                expected: expected_version,
                actual: stored.version,
            }
            .into());
        }

        txn.put_cf(cf, key, serde_json::to_vec(&package)?)?;
        txn.commit()
            .map_err(|e| self.commit_error(e, package.id, expected_version))
    }

    async fn pending(&self) -> Result<Vec<UserPackage>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|p| p.payment_status == PaymentStatus::Pending)
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<UserPackage>> {
        let cf = self.packages()?;
        let mut packages = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            packages.push(Self::decode(&value)?);
        }
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalConfig;
    use crate::domain::package::{NewPackage, PlanId, UserId};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn package(id: u64) -> UserPackage {
        UserPackage::purchase(
            NewPackage {
                id: PackageId(id),
                user: UserId(3),
                plan: PlanId(2),
                credits: 8,
                amount: dec!(99.90),
            },
            Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
            &ApprovalConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");
        assert!(store.db.cf_handle(CF_PACKAGES).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_insert_get_and_swap() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        store.insert(package(1)).await.unwrap();
        assert!(matches!(
            store.insert(package(1)).await,
            Err(PackageError::AlreadyExists(_))
        ));
        assert_eq!(store.get(PackageId(1)).await.unwrap(), Some(package(1)));

        let mut next = package(1);
        next.version = 2;
        next.payment_status = PaymentStatus::Confirmed;
        store.compare_and_swap(1, next.clone()).await.unwrap();

        let err = store.compare_and_swap(1, next.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            PackageError::Transition(TransitionError::ConcurrencyConflict { actual: 2, .. })
        ));
        assert!(store.pending().await.unwrap().is_empty());
        assert_eq!(store.get_all().await.unwrap(), vec![next]);
    }

    #[tokio::test]
    async fn test_commit_conflict_reports_stored_version() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        store.insert(package(1)).await.unwrap();

        let cf = store.packages().unwrap();
        let key = PackageId(1).0.to_be_bytes();
        let txn = store.db.transaction();
        txn.get_for_update_cf(cf, key, true).unwrap();

        let mut winner = package(1);
        winner.version = 2;
        store.compare_and_swap(1, winner).await.unwrap();

        let mut loser = package(1);
        loser.version = 2;
        txn.put_cf(cf, key, serde_json::to_vec(&loser).unwrap()).unwrap();
        let e = txn.commit().unwrap_err();

        let err = store.commit_error(e, PackageId(1), 1);
        assert!(matches!(
            err,
            PackageError::Transition(TransitionError::ConcurrencyConflict {
                expected: 1,
                actual: 2,
            })
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            store.insert(package(5)).await.unwrap();
        }
        let store = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(store.get(PackageId(5)).await.unwrap(), Some(package(5)));
    }
}
