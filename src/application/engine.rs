use crate::domain::package::{
    ActorId, IdempotencyEntry, PackageAction, PackageStatus, PaymentStatus, RecordedOutcome,
    UserPackage,
};
use crate::domain::ports::ClockRef;
use crate::error::TransitionError;
use chrono::{DateTime, Utc};

/// Reason stored on packages rejected because nobody approved them in time.
pub const WINDOW_EXPIRED_REASON: &str = "approval window expired";

/// Longest idempotency key accepted from a caller.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Result of an accepted transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The record to persist (or, for a replay, the record the recorded request returned).
    pub record: UserPackage,
    /// `true` when the request was recognised as a retry; nothing must be written.
    pub replayed: bool,
}

impl Transition {
    fn applied(record: UserPackage) -> Self {
        Self {
            record,
            replayed: false,
        }
    }
}

/// The package payment state machine.
///
/// Every operation takes the snapshot the caller just read plus the version
/// it expects that snapshot to be at, and either returns the next record
/// (version + 1) or a `TransitionError`. Nothing here touches storage; the
/// caller persists the returned record with a compare-and-swap on the
/// snapshot's version so that at most one of several racing callers wins.
///
/// ```text
/// PENDING --approve--> CONFIRMED
/// PENDING --reject | deadline sweep--> REJECTED
/// ```
pub struct PackageApprovalEngine {
    clock: ClockRef,
}

impl PackageApprovalEngine {
    pub fn new(clock: ClockRef) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Confirms the payment of a pending package.
    ///
    /// Checks run in this order: input shape, idempotent replay, version,
    /// payment status, approval deadline. A request arriving after the
    /// deadline fails with `ApprovalWindowExpired`, and the error carries the
    /// REJECTED record that has to be stored in place of the pending one.
    pub fn approve_payment(
        &self,
        record: &UserPackage,
        admin: ActorId,
        expected_version: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Transition, TransitionError> {
        validate_request(record, idempotency_key)?;
        if let Some(replay) = replay(record, idempotency_key, PackageAction::Approve) {
            return replay;
        }
        check_version(record, expected_version)?;
        require_pending(record, PackageAction::Approve)?;

        let now = self.clock.now();
        let mut next = record.clone();
        next.record_attempt(now);

        if let Some(deadline) = record.approval_deadline
            && now >= deadline
        {
            settle_rejected(&mut next, None, WINDOW_EXPIRED_REASON, now);
            remember(
                &mut next,
                idempotency_key,
                PackageAction::Approve,
                RecordedOutcome::WindowExpired,
                now,
            );
            return Err(TransitionError::ApprovalWindowExpired {
                deadline,
                record: Box::new(next),
                replayed: false,
            });
        }

        next.payment_status = PaymentStatus::Confirmed;
        if next.status == PackageStatus::Active && next.is_past_expiry(now) {
            next.status = PackageStatus::Expired;
        }
        next.decided_by = Some(admin);
        next.decided_at = Some(now);
        next.bump_version();
        remember(
            &mut next,
            idempotency_key,
            PackageAction::Approve,
            RecordedOutcome::Confirmed,
            now,
        );

        Ok(Transition::applied(next))
    }

    /// Rejects the payment of a pending package. REJECTED is terminal.
    ///
    /// Unlike approval, rejection is still accepted once the deadline has
    /// passed: the end state is the same and the admin's reason is kept.
    pub fn reject_payment(
        &self,
        record: &UserPackage,
        admin: ActorId,
        reason: &str,
        expected_version: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Transition, TransitionError> {
        validate_request(record, idempotency_key)?;
        if reason.trim().is_empty() {
            return Err(TransitionError::Validation(
                "A rejection reason is required".to_string(),
            ));
        }
        if let Some(replay) = replay(record, idempotency_key, PackageAction::Reject) {
            return replay;
        }
        check_version(record, expected_version)?;
        require_pending(record, PackageAction::Reject)?;

        let now = self.clock.now();
        let mut next = record.clone();
        next.record_attempt(now);
        settle_rejected(&mut next, Some(admin), reason.trim(), now);
        remember(
            &mut next,
            idempotency_key,
            PackageAction::Reject,
            RecordedOutcome::Rejected,
            now,
        );

        Ok(Transition::applied(next))
    }

    /// Rejects one pending package whose approval deadline lies before `now`.
    ///
    /// A package that already left PENDING fails with
    /// `InvalidStateTransition`, so sweeping the same record twice never
    /// counts it twice.
    pub fn expire_approval(
        &self,
        record: &UserPackage,
        expected_version: u64,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        check_version(record, expected_version)?;
        require_pending(record, PackageAction::Expire)?;

        match record.approval_deadline {
            Some(deadline) if deadline < now => {}
            _ => {
                return Err(TransitionError::Validation(format!(
                    "Approval window of package {} is still open",
                    record.id
                )));
            }
        }

        let mut next = record.clone();
        settle_rejected(&mut next, None, WINDOW_EXPIRED_REASON, now);
        Ok(Transition::applied(next))
    }

    /// Expires every pending package whose deadline passed before `now`.
    ///
    /// Each returned record is one version ahead of the snapshot it came
    /// from; records that are not eligible are left out.
    pub fn sweep_expired_approvals(
        &self,
        records: &[UserPackage],
        now: DateTime<Utc>,
    ) -> Vec<UserPackage> {
        records
            .iter()
            .filter_map(|record| self.expire_approval(record, record.version, now).ok())
            .map(|transition| transition.record)
            .collect()
    }

    /// Spends one credit for a booking.
    pub fn consume_credit(
        &self,
        record: &UserPackage,
        expected_version: u64,
    ) -> Result<Transition, TransitionError> {
        check_version(record, expected_version)?;
        require_confirmed(record, PackageAction::ConsumeCredit)?;

        let now = self.clock.now();
        if record.status != PackageStatus::Active {
            return Err(TransitionError::PackageUnavailable {
                status: record.status,
                action: PackageAction::ConsumeCredit,
            });
        }
        if record.is_past_expiry(now) {
            return Err(TransitionError::PackageUnavailable {
                status: PackageStatus::Expired,
                action: PackageAction::ConsumeCredit,
            });
        }

        let credits = record.credits_remaining.take_one().ok_or_else(|| {
            TransitionError::Validation(format!("Package {} has no credits left", record.id))
        })?;

        let mut next = record.clone();
        next.credits_remaining = credits;
        next.bump_version();
        Ok(Transition::applied(next))
    }

    /// Gives back one credit after a booking is cancelled.
    pub fn restore_credit(
        &self,
        record: &UserPackage,
        expected_version: u64,
    ) -> Result<Transition, TransitionError> {
        check_version(record, expected_version)?;
        require_confirmed(record, PackageAction::RestoreCredit)?;
        if record.status == PackageStatus::Cancelled {
            return Err(TransitionError::PackageUnavailable {
                status: record.status,
                action: PackageAction::RestoreCredit,
            });
        }

        let credits = record.credits_remaining.give_one().ok_or_else(|| {
            TransitionError::Validation(format!("Package {} is at its credit limit", record.id))
        })?;

        let mut next = record.clone();
        next.credits_remaining = credits;
        next.bump_version();
        Ok(Transition::applied(next))
    }

    /// Cancels a package. Payment status is left as it is.
    pub fn cancel_package(
        &self,
        record: &UserPackage,
        actor: ActorId,
        expected_version: u64,
    ) -> Result<Transition, TransitionError> {
        check_version(record, expected_version)?;
        if record.status == PackageStatus::Cancelled {
            return Err(TransitionError::PackageUnavailable {
                status: record.status,
                action: PackageAction::Cancel,
            });
        }

        let now = self.clock.now();
        let mut next = record.clone();
        next.status = PackageStatus::Cancelled;
        next.cancelled_by = Some(actor);
        next.cancelled_at = Some(now);
        next.bump_version();
        Ok(Transition::applied(next))
    }
}

fn validate_request(
    record: &UserPackage,
    idempotency_key: Option<&str>,
) -> Result<(), TransitionError> {
    if record.version == 0 {
        return Err(TransitionError::Validation(format!(
            "Package {} has no version; re-read it from the store",
            record.id
        )));
    }
    if let Some(key) = idempotency_key {
        if key.trim().is_empty() {
            return Err(TransitionError::Validation(
                "Idempotency key must not be blank".to_string(),
            ));
        }
        if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(TransitionError::Validation(format!(
                "Idempotency key longer than {MAX_IDEMPOTENCY_KEY_LEN} bytes"
            )));
        }
    }
    Ok(())
}

/// The recorded outcome when `key` already settled this record.
///
/// Replays are recognised before the version check: the retried request
/// still carries the version it originally read, which the applied
/// transition has since moved past.
fn replay(
    record: &UserPackage,
    idempotency_key: Option<&str>,
    action: PackageAction,
) -> Option<Result<Transition, TransitionError>> {
    let entry = record.recorded(idempotency_key?)?;

    if entry.action != action {
        return Some(Err(TransitionError::Validation(format!(
            "Idempotency key {:?} was already used to {} package {}",
            entry.key, entry.action, record.id
        ))));
    }

    let settled = entry.settled_record();
    Some(match entry.outcome {
        RecordedOutcome::Confirmed | RecordedOutcome::Rejected => Ok(Transition {
            record: settled,
            replayed: true,
        }),
        RecordedOutcome::WindowExpired => Err(TransitionError::ApprovalWindowExpired {
            deadline: settled.approval_deadline.unwrap_or(entry.recorded_at),
            record: Box::new(settled),
            replayed: true,
        }),
    })
}

fn check_version(record: &UserPackage, expected_version: u64) -> Result<(), TransitionError> {
    if record.version == expected_version {
        Ok(())
    } else {
        Err(TransitionError::ConcurrencyConflict {
            expected: expected_version,
            actual: record.version,
        })
    }
}

fn require_pending(record: &UserPackage, action: PackageAction) -> Result<(), TransitionError> {
    match record.payment_status {
        PaymentStatus::Pending => Ok(()),
        from => Err(TransitionError::InvalidStateTransition { from, action }),
    }
}

fn require_confirmed(record: &UserPackage, action: PackageAction) -> Result<(), TransitionError> {
    match record.payment_status {
        PaymentStatus::Confirmed => Ok(()),
        from => Err(TransitionError::InvalidStateTransition { from, action }),
    }
}

fn settle_rejected(
    next: &mut UserPackage,
    admin: Option<ActorId>,
    reason: &str,
    now: DateTime<Utc>,
) {
    next.payment_status = PaymentStatus::Rejected;
    next.decided_by = admin;
    next.decided_at = Some(now);
    next.rejection_reason = Some(reason.to_string());
    next.bump_version();
}

fn remember(
    next: &mut UserPackage,
    idempotency_key: Option<&str>,
    action: PackageAction,
    outcome: RecordedOutcome,
    now: DateTime<Utc>,
) {
    if let Some(key) = idempotency_key {
        next.idempotency = Some(IdempotencyEntry::new(key, action, outcome, next, now));
    }
}
