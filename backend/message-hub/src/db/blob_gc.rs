//! Blob garbage collection bookkeeping
//!
//! Decides which storage keys to hand to the collector when a message stops
//! referencing them. Every repository implementation enqueues exactly what
//! these functions return.

use crate::models::BlobRefs;

fn push_unique(out: &mut Vec<String>, key: &str) {
    if !key.is_empty() && !out.iter().any(|k| k == key) {
        out.push(key.to_string());
    }
}

/// Keys referenced by `before` that `after` no longer references
///
/// An image attachment is its own thumbnail, so `before` can name one key
/// twice; it is returned once.
pub fn orphaned_blobs(before: BlobRefs<'_>, after: BlobRefs<'_>) -> Vec<String> {
    let still_used = |key: &str| key == after.attachment_id || key == after.thumbnail_id;

    let mut out = Vec::new();
    for key in [before.attachment_id, before.thumbnail_id] {
        if !still_used(key) {
            push_unique(&mut out, key);
        }
    }
    out
}

/// Every distinct key referenced by a set of rows being deleted
pub fn cascade_blobs<'a>(rows: impl IntoIterator<Item = BlobRefs<'a>>) -> Vec<String> {
    let mut out = Vec::new();
    for refs in rows {
        push_unique(&mut out, refs.attachment_id);
        push_unique(&mut out, refs.thumbnail_id);
    }
    out
}
