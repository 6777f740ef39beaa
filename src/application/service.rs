use super::engine::{PackageApprovalEngine, Transition};
use crate::config::ApprovalConfig;
use crate::domain::package::{ActorId, NewPackage, PackageAction, PackageId, UserPackage};
use crate::domain::ports::{ClockRef, PackageStoreBox};
use crate::error::{PackageError, Result, TransitionError};

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Packages moved to REJECTED by this sweep.
    pub expired: Vec<PackageId>,
    /// Packages another writer changed between the read and the write.
    pub skipped: Vec<PackageId>,
}

/// Entry point for request handlers and scheduled jobs.
///
/// `ApprovalService` owns the package store and runs every mutation as
/// read snapshot, decide with the engine, then compare-and-swap on the
/// snapshot's version. A caller that loses the race gets
/// `TransitionError::ConcurrencyConflict` and should re-read and retry.
pub struct ApprovalService {
    store: PackageStoreBox,
    engine: PackageApprovalEngine,
    config: ApprovalConfig,
}

impl ApprovalService {
    /// Creates a new `ApprovalService`.
    ///
    /// # Arguments
    ///
    /// * `store` - Where package records live.
    /// * `clock` - Source of "now" for deadlines and expiry.
    /// * `config` - Approval window and validity applied to new purchases.
    pub fn new(store: PackageStoreBox, clock: ClockRef, config: ApprovalConfig) -> Self {
        Self {
            store,
            engine: PackageApprovalEngine::new(clock),
            config,
        }
    }

    /// Records a new purchase with its payment pending.
    pub async fn purchase(&self, new: NewPackage) -> Result<UserPackage> {
        let package = UserPackage::purchase(new, self.engine.now(), &self.config)?;
        self.store.insert(package.clone()).await?;
        tracing::info!(
            package = %package.id,
            user = %package.user,
            credits = %package.credits_remaining,
            "package purchased, payment pending"
        );
        Ok(package)
    }

    pub async fn get(&self, id: PackageId) -> Result<UserPackage> {
        self.store
            .get(id)
            .await?
            .ok_or(PackageError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<UserPackage>> {
        self.store.get_all().await
    }

    pub async fn approve(
        &self,
        id: PackageId,
        admin: ActorId,
        expected_version: u64,
        idempotency_key: Option<&str>,
    ) -> Result<UserPackage> {
        let snapshot = self.get(id).await?;
        let outcome =
            self.engine
                .approve_payment(&snapshot, admin, expected_version, idempotency_key);
        self.commit(&snapshot, PackageAction::Approve, outcome).await
    }

    pub async fn reject(
        &self,
        id: PackageId,
        admin: ActorId,
        reason: &str,
        expected_version: u64,
        idempotency_key: Option<&str>,
    ) -> Result<UserPackage> {
        let snapshot = self.get(id).await?;
        let outcome = self.engine.reject_payment(
            &snapshot,
            admin,
            reason,
            expected_version,
            idempotency_key,
        );
        self.commit(&snapshot, PackageAction::Reject, outcome).await
    }

    pub async fn consume_credit(&self, id: PackageId, expected_version: u64) -> Result<UserPackage> {
        let snapshot = self.get(id).await?;
        let outcome = self.engine.consume_credit(&snapshot, expected_version);
        self.commit(&snapshot, PackageAction::ConsumeCredit, outcome)
            .await
    }

    pub async fn restore_credit(&self, id: PackageId, expected_version: u64) -> Result<UserPackage> {
        let snapshot = self.get(id).await?;
        let outcome = self.engine.restore_credit(&snapshot, expected_version);
        self.commit(&snapshot, PackageAction::RestoreCredit, outcome)
            .await
    }

    pub async fn cancel(
        &self,
        id: PackageId,
        actor: ActorId,
        expected_version: u64,
    ) -> Result<UserPackage> {
        let snapshot = self.get(id).await?;
        let outcome = self.engine.cancel_package(&snapshot, actor, expected_version);
        self.commit(&snapshot, PackageAction::Cancel, outcome).await
    }

    /// Rejects every pending package whose approval deadline has passed.
    ///
    /// A package that a concurrent approval or rejection already moved on
    /// is reported as skipped; only storage faults fail the sweep.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.engine.now();
        let pending = self.store.pending().await?;
        let expired = self.engine.sweep_expired_approvals(&pending, now);

        let mut report = SweepReport::default();
        for record in expired {
            let id = record.id;
            let read_version = record.version - 1;
            match self.store.compare_and_swap(read_version, record).await {
                Ok(()) => report.expired.push(id),
                Err(PackageError::Transition(TransitionError::ConcurrencyConflict {
                    actual, ..
                })) => {
                    tracing::debug!(
                        package = %id,
                        read_version,
                        actual,
                        "package changed during sweep, skipping"
                    );
                    report.skipped.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        if !report.expired.is_empty() {
            tracing::info!(
                expired = report.expired.len(),
                skipped = report.skipped.len(),
                "approval sweep finished"
            );
        }
        Ok(report)
    }

    /// Consumes the service and returns every stored package.
    pub async fn into_results(self) -> Result<Vec<UserPackage>> {
        self.store.get_all().await
    }

    async fn commit(
        &self,
        snapshot: &UserPackage,
        action: PackageAction,
        outcome: std::result::Result<Transition, TransitionError>,
    ) -> Result<UserPackage> {
        match outcome {
            Ok(Transition {
                record,
                replayed: true,
            }) => {
                tracing::debug!(package = %record.id, %action, "idempotent replay, nothing written");
                Ok(record)
            }
            Ok(Transition { record, .. }) => {
                self.store
                    .compare_and_swap(snapshot.version, record.clone())
                    .await?;
                tracing::info!(
                    package = %record.id,
                    version = record.version,
                    payment = %record.payment_status,
                    status = %record.status,
                    %action,
                    "package transition applied"
                );
                Ok(record)
            }
            Err(err) => {
                if let Some(record) = err.pending_write() {
                    self.store
                        .compare_and_swap(snapshot.version, record.clone())
                        .await?;
                    tracing::warn!(
                        package = %record.id,
                        version = record.version,
                        "approval arrived after the deadline, package rejected"
                    );
                }
                Err(err.into())
            }
        }
    }
}
