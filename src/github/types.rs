use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Permissions;

/// One open pull request as seen by a single poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub repo_full_name: String,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub draft: bool,
    /// Combined commit status of the head commit ("success", "pending", ...).
    pub ci_state: Option<String>,
    /// GitHub's mergeable state ("clean", "dirty", "blocked", ...).
    pub mergeable_state: Option<String>,
    pub recent_comments: Vec<Comment>,
    pub recent_reviews: Vec<Review>,
}

impl PullRequestSnapshot {
    pub fn new(repo_full_name: impl Into<String>, number: u64) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            number,
            title: String::new(),
            html_url: String::new(),
            draft: false,
            ci_state: None,
            mergeable_state: None,
            recent_comments: Vec::new(),
            recent_reviews: Vec::new(),
        }
    }

    /// Repository name without the owner: `org/repo` -> `repo`.
    pub fn repo_name(&self) -> &str {
        self.repo_full_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.repo_full_name)
    }

    pub fn has_conflicts(&self) -> bool {
        self.mergeable_state.as_deref() == Some("dirty")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Outcome, e.g. "Approved" or "Changes requested".
    pub label: String,
}

/// Everything one fetch produced.
#[derive(Debug, Clone, Default)]
pub struct FetchedSnapshot {
    pub pull_requests: Vec<PullRequestSnapshot>,
    pub permissions: Permissions,
    pub viewer_login: Option<String>,
}

// Wire types for the subset of the REST API the client reads.

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub repository_url: String,
    #[serde(default)]
    pub draft: bool,
}

impl SearchItem {
    /// `https://api.github.com/repos/org/repo` -> `org/repo`.
    pub fn repo_full_name(&self) -> Option<String> {
        let (_, tail) = self.repository_url.split_once("/repos/")?;
        let tail = tail.trim_end_matches('/');
        if tail.split('/').count() == 2 {
            Some(tail.to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullDetails {
    pub head: CommitRef,
    #[serde(default)]
    pub draft: bool,
    pub mergeable_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombinedStatus {
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullReview {
    pub id: u64,
    pub user: Option<User>,
    pub state: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Login GitHub shows for deleted accounts.
pub const GHOST_LOGIN: &str = "ghost";

const PREVIEW_CHARS: usize = 120;

impl From<IssueComment> for Comment {
    fn from(comment: IssueComment) -> Self {
        Comment {
            id: comment.id.to_string(),
            author: comment
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| GHOST_LOGIN.to_string()),
            created_at: comment.created_at,
            preview: preview(comment.body.as_deref().unwrap_or("")),
        }
    }
}

impl PullReview {
    /// Pending reviews have no submission time and are not activity yet.
    pub fn into_review(self) -> Option<Review> {
        let created_at = self.submitted_at?;
        let label = review_label(&self.state)?;
        Some(Review {
            id: self.id.to_string(),
            author: self
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| GHOST_LOGIN.to_string()),
            created_at,
            label: label.to_string(),
        })
    }
}

pub fn review_label(state: &str) -> Option<&'static str> {
    match state {
        "APPROVED" => Some("Approved"),
        "CHANGES_REQUESTED" => Some("Changes requested"),
        "COMMENTED" => Some("Commented"),
        "DISMISSED" => Some("Dismissed"),
        _ => None,
    }
}

/// First non-empty line of a comment body, truncated on a char boundary.
pub fn preview(body: &str) -> String {
    let line = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let mut truncated: String = line.chars().take(PREVIEW_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
