use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a consumption attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The window's allowance would be exceeded.
    LimitExceeded,
    /// The user is suspended for this feature.
    Blocked,
}

/// Outcome of a single consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(Allowance),
    Denied(Denial),
}

/// Details of an allowed attempt.
///
/// `remaining`, `limit_value` and `window_reset_at` are `None` when the
/// user's tier grants unlimited access to the feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowance {
    pub current_usage: u64,
    pub limit_value: Option<u64>,
    pub remaining: Option<u64>,
    pub window_reset_at: Option<DateTime<Utc>>,
}

/// Details of a refused attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenyReason,
    pub current_usage: u64,
    pub limit_value: u64,
    pub window_reset_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl Decision {
    /// Allowance for a tier without a limit on the feature.
    pub fn unlimited() -> Self {
        Decision::Allowed(Allowance {
            current_usage: 0,
            limit_value: None,
            remaining: None,
            window_reset_at: None,
        })
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allowed(_) => None,
            Decision::Denied(denial) => Some(denial.reason),
        }
    }

    /// Units left in the window; `None` means unlimited or denied.
    pub fn remaining(&self) -> Option<u64> {
        match self {
            Decision::Allowed(allowance) => allowance.remaining,
            Decision::Denied(_) => None,
        }
    }

    pub fn window_reset_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Decision::Allowed(allowance) => allowance.window_reset_at,
            Decision::Denied(denial) => Some(denial.window_reset_at),
        }
    }
}

impl Allowance {
    pub fn is_unlimited(&self) -> bool {
        self.limit_value.is_none()
    }
}
