//! Join content items with their comment threads.

use crate::record::ContentItem;
use crate::thread::{CommentRef, Forest};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use serde_json::{Map, Value};

/// One content item with its metadata and the root comments posted under it.
#[derive(Debug, Serialize)]
pub struct IntegratedRecord<'f> {
    pub content_id: String,
    pub metadata: Map<String, Value>,
    /// Always present; empty when nobody commented.
    pub comment_forest: Vec<CommentRef<'f>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrateStats {
    pub content_items: usize,
    /// Content items that received at least one root comment.
    pub with_comments: usize,
    /// Distinct root comments that landed under some content item.
    pub attached_roots: usize,
    /// Root comments whose owner matched no content item.
    pub unmatched_roots: usize,
}

/// How content metadata is projected into the output.
#[derive(Clone, Copy, Debug)]
pub struct MetadataView<'a> {
    pub id_field: &'a str,
    pub keep: Option<&'a [String]>,
}

impl Default for MetadataView<'_> {
    fn default() -> Self {
        Self { id_field: "video_id", keep: None }
    }
}

fn group_roots(forest: &Forest) -> AHashMap<&str, Vec<CommentRef<'_>>> {
    let mut by_owner: AHashMap<&str, Vec<CommentRef<'_>>> = AHashMap::new();
    for root in forest.roots() {
        by_owner.entry(root.owner_id()).or_default().push(root);
    }
    by_owner
}

/// Stream one [`IntegratedRecord`] per content item, in input order, into
/// `sink`. Stops at the first error returned by `sink`.
///
/// Root comments owned by no item are left out and counted; content items
/// without comments get an empty `comment_forest`.
pub fn integrate_each<'f, I, F, E>(
    items: I,
    forest: &'f Forest,
    view: MetadataView<'_>,
    mut sink: F,
) -> Result<IntegrateStats, E>
where
    I: IntoIterator<Item = ContentItem>,
    F: FnMut(IntegratedRecord<'f>) -> Result<(), E>,
{
    let by_owner = group_roots(forest);
    let mut claimed: AHashSet<&'f str> = AHashSet::new();
    let mut stats = IntegrateStats::default();

    for item in items {
        stats.content_items += 1;
        let comment_forest = match by_owner.get_key_value(item.id.as_str()) {
            Some((&owner, roots)) => {
                if claimed.insert(owner) {
                    stats.attached_roots += roots.len();
                }
                stats.with_comments += 1;
                roots.clone()
            }
            None => Vec::new(),
        };
        let metadata = item.metadata(view.id_field, view.keep);
        sink(IntegratedRecord { content_id: item.id, metadata, comment_forest })?;
    }

    for (owner, roots) in by_owner.iter().filter(|(o, _)| !claimed.contains(*o)) {
        tracing::warn!(owner_id = %owner, roots = roots.len(), "comments reference a content item that is not in the input");
        stats.unmatched_roots += roots.len();
    }
    Ok(stats)
}

/// Collect the whole joined dataset in memory. Prefer [`integrate_each`] for
/// large inputs.
pub fn integrate<'f, I>(items: I, forest: &'f Forest, view: MetadataView<'_>) -> (Vec<IntegratedRecord<'f>>, IntegrateStats)
where
    I: IntoIterator<Item = ContentItem>,
{
    let mut out = Vec::new();
    let stats = integrate_each(items, forest, view, |rec| {
        out.push(rec);
        Ok::<(), std::convert::Infallible>(())
    });
    match stats {
        Ok(stats) => (out, stats),
        Err(never) => match never {},
    }
}
