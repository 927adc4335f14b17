use serde::{Deserialize, Serialize};
use std::fmt;

use crate::github::types::PullRequestSnapshot;

/// Stable storage key for one pull request: `org:repo-42`.
///
/// `/` becomes `:`, which GitHub does not allow in owner or repository
/// names, so the mapping is injective. The trailing `-{number}` is always
/// the last dash-separated segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatermarkKey(String);

impl WatermarkKey {
    pub fn new(repo_full_name: &str, number: u64) -> Self {
        let slug = repo_full_name.replace('/', ":");
        WatermarkKey(format!("{}-{}", slug, number))
    }

    pub fn for_pull_request(pr: &PullRequestSnapshot) -> Self {
        Self::new(&pr.repo_full_name, pr.number)
    }

    /// Wrap a key read back from storage.
    pub fn from_stored(raw: String) -> Self {
        WatermarkKey(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(WatermarkKey::new("octo-org/hello-world", 42).as_str(), "octo-org:hello-world-42");
    }

    #[test]
    fn test_key_is_deterministic() {
        let pr = PullRequestSnapshot::new("org/repo", 7);
        assert_eq!(WatermarkKey::for_pull_request(&pr), WatermarkKey::for_pull_request(&pr));
    }

    #[test]
    fn test_dashes_in_names_do_not_collide() {
        // With `-` as the separator these two would both be `a-b-c-1`.
        let first = WatermarkKey::new("a/b-c", 1);
        let second = WatermarkKey::new("a-b/c", 1);
        assert_ne!(first, second);
    }

    #[test]
    fn test_numbers_do_not_collide_with_repo_suffixes() {
        let first = WatermarkKey::new("org/repo-1", 2);
        let second = WatermarkKey::new("org/repo", 12);
        assert_ne!(first, second);
    }
}
