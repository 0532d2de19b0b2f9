//! Client-side search over the message list.

use crate::models::MessageSummary;

/// Criteria shorter than this (in characters) show every row.
pub const MIN_CRITERIA_LEN: usize = 2;

/// One flag per row, in row order.
pub type Visibility = Vec<bool>;

/// Compute which rows match `criteria`. A row matches when the criteria is a
/// case-insensitive substring of its subject or sender.
pub fn apply_search<'a, I>(rows: I, criteria: &str) -> Visibility
where
    I: IntoIterator<Item = &'a MessageSummary>,
{
    let needle = criteria.to_lowercase();
    if needle.chars().count() < MIN_CRITERIA_LEN {
        return rows.into_iter().map(|_| true).collect();
    }
    rows.into_iter().map(|row| matches(row, &needle)).collect()
}

fn matches(row: &MessageSummary, needle: &str) -> bool {
    row.subject.to_lowercase().contains(needle) || row.from.to_lowercase().contains(needle)
}
