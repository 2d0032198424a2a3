//! Access to the repository hosting service.
//!
//! [`Provider`] is the only entry point the rest of the crate uses: it wraps a raw
//! [`Client`] with a TTL [`Cache`], a [`BackoffPolicy`] and a [`Throttler`], and reports
//! every call as an [`ApiOutcome`].

mod backoff;
mod cache;
mod client;
mod clock;
mod outcome;
mod provider;
mod throttler;

pub use backoff::BackoffPolicy;
pub use cache::{Cache, CacheKey, CacheResult, DEFAULT_CACHE_TTL};
pub use client::{Client, RateLimitInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use outcome::ApiOutcome;
pub use provider::{Provider, QuotaStatus, SearchQuery, language_slug};
pub use throttler::Throttler;
