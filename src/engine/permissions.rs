use serde::{Deserialize, Serialize};

use crate::activity::ActivityKind;

/// Which API scopes the current token can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_read_pull_requests: bool,
    pub can_read_commit_statuses: bool,
    pub can_read_reviews: bool,
    pub can_read_comments: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            can_read_pull_requests: true,
            can_read_commit_statuses: true,
            can_read_reviews: true,
            can_read_comments: true,
        }
    }
}

impl Permissions {
    pub fn has_all(&self) -> bool {
        self.can_read_pull_requests
            && self.can_read_commit_statuses
            && self.can_read_reviews
            && self.can_read_comments
    }

    /// Display names of the missing scopes.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.can_read_pull_requests {
            missing.push("Pull Requests");
        }
        if !self.can_read_commit_statuses {
            missing.push("CI/CD Status");
        }
        if !self.can_read_reviews {
            missing.push("Reviews");
        }
        if !self.can_read_comments {
            missing.push("Comments");
        }
        missing
    }

    /// Whether activity data for `kind` can be trusted at all.
    pub fn can_read(&self, kind: ActivityKind) -> bool {
        match kind {
            ActivityKind::Comment => self.can_read_comments,
            ActivityKind::Review => self.can_read_reviews,
        }
    }
}
