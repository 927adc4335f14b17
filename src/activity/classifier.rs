use chrono::{DateTime, Utc};

use super::Activity;

/// Items of one category that are newer than the stored watermark and not
/// written by the current user.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedActivity<'a, T> {
    pub new_items: Vec<&'a T>,
}

impl<'a, T: Activity> ClassifiedActivity<'a, T> {
    pub fn is_empty(&self) -> bool {
        self.new_items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new_items.len()
    }

    /// Most recent new item.
    pub fn latest(&self) -> Option<&'a T> {
        latest(self.new_items.iter().copied())
    }
}

/// Classify one category of a pull request against its watermark.
///
/// Returns `None` when no watermark exists for the category: such a pull
/// request is seeded, never classified. Self-filtering is skipped when the
/// current login is unknown or blank.
pub fn classify<'a, T: Activity>(
    items: &'a [T],
    last_seen: Option<DateTime<Utc>>,
    current_user: Option<&str>,
) -> Option<ClassifiedActivity<'a, T>> {
    let last_seen = last_seen?;
    let login = current_user.map(str::trim).filter(|l| !l.is_empty());

    let new_items = items
        .iter()
        .filter(|item| item.created_at() > last_seen)
        .filter(|item| !is_from_self(item.author(), login))
        .collect();

    Some(ClassifiedActivity { new_items })
}

fn is_from_self(author: &str, login: Option<&str>) -> bool {
    match login {
        Some(login) => author.to_lowercase() == login.to_lowercase(),
        None => false,
    }
}

/// Item with the greatest `created_at`; on ties the earliest in fetch order
/// wins.
pub fn latest<'a, T: Activity + 'a>(items: impl IntoIterator<Item = &'a T>) -> Option<&'a T> {
    items.into_iter().fold(None, |best: Option<&'a T>, item| match best {
        Some(current) if item.created_at() <= current.created_at() => Some(current),
        _ => Some(item),
    })
}

/// Timestamp a category's watermark should move to after this pass, if any.
///
/// All observed items count, including self-authored and already-seen ones.
/// An empty category with no watermark seeds to `now`; an empty category
/// that already has one stays put.
pub fn next_watermark<T: Activity>(
    items: &[T],
    stored: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match latest(items) {
        Some(item) => Some(item.created_at()),
        None if stored.is_none() => Some(now),
        None => None,
    }
}
