use crate::config::ApprovalConfig;
use crate::error::PackageError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of one purchased package instance.
    PackageId
);
id_type!(
    /// The student who owns a package.
    UserId
);
id_type!(
    /// The catalogue package type a purchase was made against.
    PlanId
);
id_type!(
    /// An already-authenticated admin (or student) acting on a package.
    ActorId
);

/// Number of class credits left on a package. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credits(u32);

impl Credits {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// One credit fewer, or `None` when nothing is left.
    pub fn take_one(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    pub fn give_one(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Price paid for a package. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PackageError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PackageError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Whether credits on the package may be consumed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Active,
    Expired,
    Cancelled,
}

/// Whether the purchase has been paid for.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Every mutating operation the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageAction {
    Approve,
    Reject,
    Expire,
    ConsumeCredit,
    RestoreCredit,
    Cancel,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageStatus::Active => "active",
            PackageStatus::Expired => "expired",
            PackageStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageAction::Approve => "approve",
            PackageAction::Reject => "reject",
            PackageAction::Expire => "expire",
            PackageAction::ConsumeCredit => "consume a credit of",
            PackageAction::RestoreCredit => "restore a credit to",
            PackageAction::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// How the approve/reject request that settled the payment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedOutcome {
    Confirmed,
    Rejected,
    WindowExpired,
}

/// Replay ledger kept on the row itself.
///
/// A package settles its payment at most once, so a single entry is enough
/// to recognise every retry of the request that settled it. The entry keeps
/// the record exactly as that request left it, so a retry gets the same
/// answer even after later credit or cancel transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub key: String,
    pub action: PackageAction,
    pub outcome: RecordedOutcome,
    /// Version the record was left at by the recorded request.
    pub version: u64,
    pub recorded_at: DateTime<Utc>,
    /// The settled record, stored without its own ledger entry.
    settled: Box<UserPackage>,
}

impl IdempotencyEntry {
    pub(crate) fn new(
        key: &str,
        action: PackageAction,
        outcome: RecordedOutcome,
        settled: &UserPackage,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let mut settled = settled.clone();
        settled.idempotency = None;
        Self {
            key: key.to_string(),
            action,
            outcome,
            version: settled.version,
            recorded_at,
            settled: Box::new(settled),
        }
    }

    /// The record the recorded request returned, ledger entry included.
    pub fn settled_record(&self) -> UserPackage {
        let mut record = (*self.settled).clone();
        record.idempotency = Some(self.clone());
        record
    }
}

/// Input of the purchase flow.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPackage {
    pub id: PackageId,
    pub user: UserId,
    pub plan: PlanId,
    pub credits: u32,
    pub amount: Decimal,
}

/// One purchased credit package owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPackage {
    pub id: PackageId,
    pub user: UserId,
    pub plan: PlanId,
    pub credits_remaining: Credits,
    pub amount: Amount,
    pub expiry_date: DateTime<Utc>,
    pub status: PackageStatus,
    pub payment_status: PaymentStatus,
    /// Starts at 1 and grows by exactly one per applied transition.
    pub version: u64,
    pub idempotency: Option<IdempotencyEntry>,
    pub approval_deadline: Option<DateTime<Utc>>,
    pub last_approval_attempt_at: Option<DateTime<Utc>>,
    pub approval_attempt_count: u32,
    pub decided_by: Option<ActorId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancelled_by: Option<ActorId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserPackage {
    /// Creates the record the purchase flow stores: payment pending, version 1.
    pub fn purchase(
        new: NewPackage,
        now: DateTime<Utc>,
        config: &ApprovalConfig,
    ) -> Result<Self, PackageError> {
        if new.credits == 0 {
            return Err(PackageError::ValidationError(
                "A package must carry at least one credit".to_string(),
            ));
        }
        let amount = Amount::new(new.amount)?;

        Ok(Self {
            id: new.id,
            user: new.user,
            plan: new.plan,
            credits_remaining: Credits::new(new.credits),
            amount,
            expiry_date: now + config.validity,
            status: PackageStatus::Active,
            payment_status: PaymentStatus::Pending,
            version: 1,
            idempotency: None,
            approval_deadline: config.approval_window.map(|window| now + window),
            last_approval_attempt_at: None,
            approval_attempt_count: 0,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
        })
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_date
    }

    /// Credits can only be spent on a paid, active, unexpired package.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == PackageStatus::Active
            && self.payment_status == PaymentStatus::Confirmed
            && !self.is_past_expiry(now)
            && !self.credits_remaining.is_empty()
    }

    /// The idempotency entry for `key`, if this record was settled by it.
    pub fn recorded(&self, key: &str) -> Option<&IdempotencyEntry> {
        self.idempotency.as_ref().filter(|entry| entry.key == key)
    }

    pub(crate) fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.approval_attempt_count = self.approval_attempt_count.saturating_add(1);
        self.last_approval_attempt_at = Some(now);
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}
