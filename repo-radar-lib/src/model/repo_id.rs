use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Canonical `owner/name` identity of a repository.
///
/// Identities are case-sensitive and compared verbatim, so `Owner/Repo` and
/// `owner/repo` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    full: Arc<str>,
}

impl RepoId {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        let Some((owner, name)) = text.split_once('/') else {
            bail!("invalid repository identity '{text}': expected 'owner/name'");
        };

        if owner.is_empty() || name.is_empty() {
            bail!("invalid repository identity '{text}': empty owner or name");
        }

        if name.contains('/') || text.chars().any(char::is_whitespace) {
            bail!("invalid repository identity '{text}': expected exactly 'owner/name'");
        }

        Ok(Self { full: Arc::from(text) })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        self.parts().0
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.parts().1
    }

    fn parts(&self) -> (&str, &str) {
        self.full.split_once('/').unwrap_or((&self.full, ""))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.full)
    }
}

impl TryFrom<String> for RepoId {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.full.to_string()
    }
}
