//! Activity diffing
//!
//! Pure functions deciding which comments and reviews on a pull request are
//! new to the user, and how to phrase them.

pub mod classifier;
pub mod composer;
pub mod key;

pub use classifier::{classify, latest, next_watermark, ClassifiedActivity};
pub use composer::{compose, Describe, NotificationIntent};
pub use key::WatermarkKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::types::{Comment, Review};

/// The two activity categories tracked per pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Comment,
    Review,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 2] = [ActivityKind::Comment, ActivityKind::Review];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Comment => "comment",
            ActivityKind::Review => "review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "comment" => Some(ActivityKind::Comment),
            "review" => Some(ActivityKind::Review),
            _ => None,
        }
    }
}

/// Common view over comments and reviews.
pub trait Activity {
    fn id(&self) -> &str;
    fn author(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Activity for Comment {
    fn id(&self) -> &str {
        &self.id
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Activity for Review {
    fn id(&self) -> &str {
        &self.id
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
