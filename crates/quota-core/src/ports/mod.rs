//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod cache;
mod observer;
mod profile;
mod store;

pub use cache::{CacheError, TierCache};
pub use observer::{FallbackCause, QuotaObserver, TracingObserver};
pub use profile::{ProfileError, ProfileSource};
pub use store::QuotaStore;
