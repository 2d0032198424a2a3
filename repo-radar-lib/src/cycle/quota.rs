use super::CycleMode;
use crate::hosting::{ApiOutcome, Provider, QuotaStatus};
use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

const LOG_TARGET: &str = "     quota";

/// What to do when the remaining API quota is below the reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LowQuotaPolicy {
    /// Wait for the quota to reset if that happens soon enough.
    Defer,

    /// Run immediately with the quota-heavy sources skipped.
    Degrade,
}

/// Result of looking at the quota before a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Proceed,
    WaitThenProceed(Duration),
    Degrade,
}

/// Decides between a full and a degraded cycle based on the remaining API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGate {
    pub reserve: u64,
    pub policy: LowQuotaPolicy,
    pub max_wait: Duration,
}

impl QuotaGate {
    /// Pick a course of action.
    ///
    /// `budget` is how long the cycle can wait and still leave each source its full timeout
    /// before the cycle deadline. A quota status that could not be fetched leads to a
    /// degraded cycle.
    #[must_use]
    pub fn decide(&self, status: &ApiOutcome<QuotaStatus>, now: DateTime<Utc>, budget: Duration) -> QuotaDecision {
        let ApiOutcome::Ok(status) = status else {
            log::warn!(target: LOG_TARGET, "Could not determine API quota ({status}), running degraded");
            return QuotaDecision::Degrade;
        };

        if status.remaining >= self.reserve {
            log::debug!(target: LOG_TARGET, "API quota {}/{} is above the reserve", status.remaining, status.limit);
            return QuotaDecision::Proceed;
        }

        match self.policy {
            LowQuotaPolicy::Degrade => {
                log::warn!(
                    target: LOG_TARGET,
                    "API quota {} is below the reserve of {}, running degraded",
                    status.remaining,
                    self.reserve
                );
                QuotaDecision::Degrade
            }

            LowQuotaPolicy::Defer => {
                let wait = (status.reset_at - now).to_std().unwrap_or_default();
                if wait <= self.max_wait && wait < budget {
                    log::info!(
                        target: LOG_TARGET,
                        "API quota {} is below the reserve of {}, waiting {}s for the reset",
                        status.remaining,
                        self.reserve,
                        wait.as_secs()
                    );
                    QuotaDecision::WaitThenProceed(wait)
                } else {
                    log::warn!(
                        target: LOG_TARGET,
                        "API quota resets in {}s, longer than the cycle can wait; running degraded",
                        wait.as_secs()
                    );
                    QuotaDecision::Degrade
                }
            }
        }
    }

    /// Query the quota and act on the decision, sleeping through a deferral.
    ///
    /// The time spent querying the quota is taken out of `budget`.
    pub async fn check(&self, provider: &Provider, budget: Duration) -> CycleMode {
        let started = Instant::now();
        let status = provider.quota_status().await;
        let budget = budget.saturating_sub(started.elapsed());

        match self.decide(&status, provider.now(), budget) {
            QuotaDecision::Proceed => CycleMode::Full,
            QuotaDecision::WaitThenProceed(wait) => {
                tokio::time::sleep(wait).await;
                CycleMode::Full
            }
            QuotaDecision::Degrade => CycleMode::Degraded,
        }
    }
}
