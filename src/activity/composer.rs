use serde::{Deserialize, Serialize};

use super::classifier::ClassifiedActivity;
use super::key::WatermarkKey;
use super::{Activity, ActivityKind};
use crate::github::types::{Comment, PullRequestSnapshot, Review};

/// A notification the engine wants shown.
///
/// `id` is derived from the category, the watermark key and the latest
/// item, so composing the same activity twice yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Per-category wording.
pub trait Describe: Activity {
    const KIND: ActivityKind;

    fn single_body(&self) -> String;
    fn summary_body(&self, count: usize) -> String;
}

impl Describe for Comment {
    const KIND: ActivityKind = ActivityKind::Comment;

    fn single_body(&self) -> String {
        format!("New comment by {}: {}", self.author, self.preview)
    }

    fn summary_body(&self, count: usize) -> String {
        format!(
            "{} new comments. Latest by {}: {}",
            count, self.author, self.preview
        )
    }
}

impl Describe for Review {
    const KIND: ActivityKind = ActivityKind::Review;

    fn single_body(&self) -> String {
        format!("{} review by {}", self.label, self.author)
    }

    fn summary_body(&self, count: usize) -> String {
        format!("{} new reviews. Latest: {} by {}", count, self.label, self.author)
    }
}

/// Build the single notification for one category of one pull request.
///
/// Returns `None` for an empty classification.
pub fn compose<T: Describe>(
    pr: &PullRequestSnapshot,
    key: &WatermarkKey,
    classified: &ClassifiedActivity<'_, T>,
) -> Option<NotificationIntent> {
    let latest = classified.latest()?;
    let count = classified.len();

    let body = if count == 1 {
        latest.single_body()
    } else {
        latest.summary_body(count)
    };

    Some(NotificationIntent {
        id: format!("{}-{}-{}", T::KIND.as_str(), key, latest.id()),
        title: format!("{} #{}", pr.repo_name(), pr.number),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::classify;
    use chrono::{Duration, TimeZone, Utc};

    fn pr_with(comments: Vec<Comment>, reviews: Vec<Review>) -> PullRequestSnapshot {
        let mut pr = PullRequestSnapshot::new("octo-org/widgets", 17);
        pr.recent_comments = comments;
        pr.recent_reviews = reviews;
        pr
    }

    fn comment(id: &str, author: &str, secs: i64, preview: &str) -> Comment {
        Comment {
            id: id.to_string(),
            author: author.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
            preview: preview.to_string(),
        }
    }

    fn review(id: &str, author: &str, secs: i64, label: &str) -> Review {
        Review {
            id: id.to_string(),
            author: author.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
            label: label.to_string(),
        }
    }

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_single_comment() {
        let pr = pr_with(vec![comment("501", "alice", 5, "Nice catch")], vec![]);
        let key = WatermarkKey::for_pull_request(&pr);
        let classified = classify(&pr.recent_comments, Some(epoch()), None).unwrap();

        let intent = compose(&pr, &key, &classified).unwrap();
        assert_eq!(intent.title, "widgets #17");
        assert_eq!(intent.body, "New comment by alice: Nice catch");
        assert_eq!(intent.id, "comment-octo-org:widgets-17-501");
    }

    #[test]
    fn test_multiple_comments_name_the_latest() {
        let pr = pr_with(
            vec![
                comment("1", "alice", 5, "first"),
                comment("2", "carol", 9, "second"),
                comment("3", "dave", 7, "third"),
            ],
            vec![],
        );
        let key = WatermarkKey::for_pull_request(&pr);
        let classified = classify(&pr.recent_comments, Some(epoch()), None).unwrap();

        let intent = compose(&pr, &key, &classified).unwrap();
        assert_eq!(intent.body, "3 new comments. Latest by carol: second");
        assert!(intent.id.ends_with("-2"));
    }

    #[test]
    fn test_review_bodies() {
        let pr = pr_with(vec![], vec![review("70", "erin", 3, "Approved")]);
        let key = WatermarkKey::for_pull_request(&pr);
        let classified = classify(&pr.recent_reviews, Some(epoch()), None).unwrap();
        let intent = compose(&pr, &key, &classified).unwrap();
        assert_eq!(intent.body, "Approved review by erin");
        assert_eq!(intent.id, "review-octo-org:widgets-17-70");

        let pr = pr_with(
            vec![],
            vec![
                review("70", "erin", 3, "Approved"),
                review("71", "frank", 4, "Changes requested"),
            ],
        );
        let classified = classify(&pr.recent_reviews, Some(epoch()), None).unwrap();
        let intent = compose(&pr, &key, &classified).unwrap();
        assert_eq!(intent.body, "2 new reviews. Latest: Changes requested by frank");
    }

    #[test]
    fn test_empty_classification_composes_nothing() {
        let pr = pr_with(vec![comment("1", "alice", -5, "old")], vec![]);
        let key = WatermarkKey::for_pull_request(&pr);
        let classified = classify(&pr.recent_comments, Some(epoch()), None).unwrap();
        assert!(compose(&pr, &key, &classified).is_none());
    }

    #[test]
    fn test_ids_are_stable() {
        let pr = pr_with(vec![comment("1", "alice", 5, "a"), comment("2", "bob", 6, "b")], vec![]);
        let key = WatermarkKey::for_pull_request(&pr);
        let first = compose(&pr, &key, &classify(&pr.recent_comments, Some(epoch()), None).unwrap());
        let second = compose(&pr, &key, &classify(&pr.recent_comments, Some(epoch()), None).unwrap());
        assert_eq!(first, second);
    }
}
