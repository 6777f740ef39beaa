use chrono::Duration;

pub const DEFAULT_APPROVAL_WINDOW_HOURS: u32 = 48;
pub const DEFAULT_VALIDITY_DAYS: u32 = 30;

/// Time limits applied to newly purchased packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalConfig {
    /// How long an admin has to confirm a payment. `None` disables the deadline.
    pub approval_window: Option<Duration>,
    /// How long a package stays usable after purchase.
    pub validity: Duration,
}

impl ApprovalConfig {
    /// Builds a config from whole hours/days; a window of zero hours means no deadline.
    pub fn from_units(approval_window_hours: u32, validity_days: u32) -> Self {
        let approval_window =
            (approval_window_hours > 0).then(|| Duration::hours(i64::from(approval_window_hours)));
        Self {
            approval_window,
            validity: Duration::days(i64::from(validity_days)),
        }
    }
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self::from_units(DEFAULT_APPROVAL_WINDOW_HOURS, DEFAULT_VALIDITY_DAYS)
    }
}
