//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a consume request. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeRequest {
    #[serde(default = "default_amount")]
    pub amount: u64,
    #[serde(default = "default_respect_blocks")]
    pub respect_blocks: bool,
}

fn default_amount() -> u64 {
    1
}

fn default_respect_blocks() -> bool {
    true
}

impl Default for ConsumeRequest {
    fn default() -> Self {
        Self {
            amount: default_amount(),
            respect_blocks: default_respect_blocks(),
        }
    }
}

/// Outcome of a consume request.
///
/// Limit fields are absent for features the user's tier does not meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionView {
    pub allowed: bool,
    /// `limit_exceeded` or `blocked` when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub current_usage: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Usage of every feature of a user's tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub user_id: String,
    pub tier: String,
    pub features: Vec<FeatureStatusView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStatusView {
    pub feature_key: String,
    pub unlimited: bool,
    pub used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Quota store backend in use.
    pub store: String,
    pub timestamp: DateTime<Utc>,
}
