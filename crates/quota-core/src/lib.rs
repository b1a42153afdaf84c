//! # Quota Core
//!
//! The domain layer of the quota service: usage records, tier policies,
//! decisions, the ports infrastructure must implement, and the engine that
//! decides whether a gated action may proceed.
//!
//! No infrastructure dependencies live here. Stores, caches and profile
//! sources are plugged in through the traits in [`ports`].

pub mod clock;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{Decision, DenyReason, FeatureKey, QuotaKey, QuotaRecord, TierPolicyTable};
pub use engine::{LimiterConfig, QuotaEngine, QuotaEngineBuilder};
pub use error::{PolicyError, QuotaError, StoreError};
