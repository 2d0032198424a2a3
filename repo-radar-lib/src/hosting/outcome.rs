use super::client::RateLimitInfo;
use core::fmt::{Display, Formatter};
use std::sync::Arc;

/// The classified result of a hosting API operation.
#[derive(Debug, Clone)]
pub enum ApiOutcome<T> {
    /// The operation succeeded.
    Ok(T),

    /// The requested resource does not exist (404).
    NotFound,

    /// The provider refused the request for quota reasons, and the retry budget ran out.
    RateLimited(Option<RateLimitInfo>),

    /// A server error or network failure persisted through the retry budget.
    Transient(Arc<ohno::AppError>),

    /// A permanent failure: unexpected status or an undecodable body. Never retried.
    Failed(Arc<ohno::AppError>),
}

impl<T> ApiOutcome<T> {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Whether a retry could plausibly produce a different result.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }

    /// Returns the contained data if `Ok`, otherwise `None`.
    #[must_use]
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Ok(data) => Some(data),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            Self::Ok(data) => ApiOutcome::Ok(f(data)),
            Self::NotFound => ApiOutcome::NotFound,
            Self::RateLimited(info) => ApiOutcome::RateLimited(info),
            Self::Transient(e) => ApiOutcome::Transient(e),
            Self::Failed(e) => ApiOutcome::Failed(e),
        }
    }
}

/// Describes a non-`Ok` outcome for diagnostics.
impl<T> Display for ApiOutcome<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "ok"),
            Self::NotFound => write!(f, "not found"),
            Self::RateLimited(Some(info)) => write!(
                f,
                "rate limited ({} remaining, resets at {})",
                info.remaining,
                info.reset_at.format("%T")
            ),
            Self::RateLimited(None) => write!(f, "rate limited"),
            Self::Transient(e) => write!(f, "transient failure: {e:#}"),
            Self::Failed(e) => write!(f, "failed: {e:#}"),
        }
    }
}
