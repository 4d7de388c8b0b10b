//! Mention Parser Utility
//!
//! Extracts @mentions from message and comment text for tag notifications.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Matches @name where name is letters, digits, `_`, `.` or `-`,
/// not ending in punctuation
static MENTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w@])@(\w(?:[\w.\-]*\w)?)").expect("Invalid mention regex")
});

/// Extract @mentions from text
///
/// Returns lowercased names without the `@`, deduplicated in order of first
/// appearance.
///
/// # Examples
/// ```
/// use message_hub::services::extract_mentions;
///
/// let mentions = extract_mentions("Hey @Alice and @bob, see @alice's photo");
/// assert_eq!(mentions, vec!["alice", "bob"]);
/// ```
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
