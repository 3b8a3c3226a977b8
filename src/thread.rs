//! Comment thread reconstruction: flat records in, forest of reply trees out.
//!
//! Every node lives in one arena owned by [`Forest`]; parents refer to their
//! replies by [`NodeId`]. A node reached first as someone's parent and later
//! visited as a record in its own right is the same arena slot, so replies
//! attached through either path land in the same place.

use crate::config::FieldNames;
use crate::record::CommentRecord;
use ahash::AHashMap;
use serde::ser::{Error as _, Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};

/// Deepest reply nesting that can be serialized. Building and walking have no
/// limit; writing a chain nested deeper than this fails with an error.
pub const MAX_REPLY_DEPTH: usize = 256;

/// Handle into the forest arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct CommentNode {
    record: CommentRecord,
    placeholder: bool,
    replies: Vec<NodeId>,
}

/// Counters gathered while building. Nothing here is an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Input records, duplicates included.
    pub records: usize,
    /// Distinct comment ids materialized.
    pub comments: usize,
    pub roots: usize,
    /// Stand-ins for parent ids that exist nowhere in the input.
    pub placeholders: usize,
    /// Links refused because they would close a parent cycle (self references included).
    pub cycles_broken: usize,
    /// Records replaced by a later record with the same id.
    pub duplicates: usize,
    /// Longest reply chain below any root or placeholder; a lone top-level
    /// comment has depth 0.
    pub max_depth: usize,
}

/// Union-find over tree tops. `find(x)` is the node that currently has no
/// parent in x's tree; attaching `child` under `parent` closes a cycle
/// exactly when `find(parent) == child`.
struct TreeTops {
    up: Vec<usize>,
}

impl TreeTops {
    fn new(n: usize) -> Self {
        Self { up: (0..n).collect() }
    }
    fn push(&mut self) {
        let n = self.up.len();
        self.up.push(n);
    }
    fn find(&mut self, mut x: usize) -> usize {
        while self.up[x] != x {
            self.up[x] = self.up[self.up[x]];
            x = self.up[x];
        }
        x
    }
    // `child` must still be a top.
    fn link(&mut self, child: usize, parent: usize) {
        self.up[child] = parent;
    }
}

/// The reconstructed threads: root comments in input order, plus the
/// placeholders that hold replies to parents missing from the input.
#[derive(Debug)]
pub struct Forest {
    nodes: Vec<CommentNode>,
    roots: Vec<NodeId>,
    placeholders: Vec<NodeId>,
    registry: AHashMap<String, NodeId>,
    stats: BuildStats,
}

/// Build the reply forest from a flat, arbitrarily ordered set of comments.
///
/// Duplicate ids are last-wins: the later record replaces the earlier one but
/// keeps the earlier one's position. A comment whose parent would make it its
/// own ancestor (including a comment naming itself) is treated like an orphan
/// and parked under a fresh placeholder.
pub fn build_forest(comments: Vec<CommentRecord>, fields: &FieldNames) -> Forest {
    let mut stats = BuildStats { records: comments.len(), ..Default::default() };

    // Materialize: exactly one node per comment id.
    let mut nodes: Vec<CommentNode> = Vec::with_capacity(comments.len());
    let mut registry: AHashMap<String, NodeId> = AHashMap::with_capacity(comments.len());
    for rec in comments {
        if let Some(&id) = registry.get(&rec.comment_id) {
            tracing::debug!(comment_id = %rec.comment_id, "duplicate comment id, keeping the later record");
            stats.duplicates += 1;
            nodes[id.0].record = rec;
            continue;
        }
        registry.insert(rec.comment_id.clone(), NodeId(nodes.len()));
        nodes.push(CommentNode { record: rec, placeholder: false, replies: Vec::new() });
    }
    let materialized = nodes.len();
    stats.comments = materialized;

    // Link: one pass over the registry in input order.
    let mut roots = Vec::new();
    let mut placeholders = Vec::new();
    let mut attached: AHashMap<String, NodeId> = AHashMap::with_capacity(materialized);
    let mut tops = TreeTops::new(materialized);

    for i in 0..materialized {
        let me = NodeId(i);
        let Some(parent_key) = nodes[i].record.parent_id.clone() else {
            roots.push(me);
            attached.insert(nodes[i].record.comment_id.clone(), me);
            continue;
        };

        let known = match attached.get(&parent_key).copied() {
            Some(p) => Some(p),
            None => registry.get(&parent_key).copied().map(|p| {
                attached.insert(parent_key.clone(), p);
                p
            }),
        };

        let target = match known {
            Some(p) if tops.find(p.0) == i => {
                tracing::warn!(
                    comment_id = %nodes[i].record.comment_id,
                    parent_id = %parent_key,
                    "parent link would form a cycle; parking comment under a placeholder"
                );
                stats.cycles_broken += 1;
                let owner = nodes[i].record.owner_id.clone();
                let ph = push_placeholder(&mut nodes, &mut tops, &parent_key, &owner, fields);
                placeholders.push(ph);
                ph
            }
            Some(p) => p,
            None => {
                tracing::debug!(
                    comment_id = %nodes[i].record.comment_id,
                    parent_id = %parent_key,
                    "parent not in input; synthesizing placeholder"
                );
                stats.placeholders += 1;
                let owner = nodes[i].record.owner_id.clone();
                let ph = push_placeholder(&mut nodes, &mut tops, &parent_key, &owner, fields);
                attached.insert(parent_key, ph);
                placeholders.push(ph);
                ph
            }
        };

        nodes[target.0].replies.push(me);
        tops.link(i, target.0);
    }

    stats.roots = roots.len();
    stats.max_depth = deepest(&nodes, roots.iter().chain(&placeholders).copied());
    tracing::debug!(
        comments = stats.comments,
        roots = stats.roots,
        placeholders = stats.placeholders,
        cycles_broken = stats.cycles_broken,
        duplicates = stats.duplicates,
        max_depth = stats.max_depth,
        "comment forest built"
    );

    Forest { nodes, roots, placeholders, registry, stats }
}

fn deepest(nodes: &[CommentNode], tops: impl Iterator<Item = NodeId>) -> usize {
    let mut max = 0;
    let mut stack: Vec<(NodeId, usize)> = tops.map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        max = max.max(depth);
        stack.extend(nodes[id.0].replies.iter().map(|&r| (r, depth + 1)));
    }
    max
}

fn push_placeholder(
    nodes: &mut Vec<CommentNode>,
    tops: &mut TreeTops,
    comment_id: &str,
    owner_id: &str,
    fields: &FieldNames,
) -> NodeId {
    let record = CommentRecord {
        comment_id: comment_id.to_string(),
        parent_id: None,
        owner_id: owner_id.to_string(),
        payload: placeholder_payload(comment_id, owner_id, fields),
    };
    let id = NodeId(nodes.len());
    nodes.push(CommentNode { record, placeholder: true, replies: Vec::new() });
    tops.push();
    id
}

/// Empty comment body in the shape crawler exports use.
fn placeholder_payload(comment_id: &str, owner_id: &str, fields: &FieldNames) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert(fields.comment_id.clone(), json!(comment_id));
    m.insert(fields.parent_id.clone(), json!("0"));
    m.insert(fields.owner_id.clone(), json!(owner_id));
    for key in ["content", "nickname", "user_id", "sex", "sign", "avatar"] {
        m.entry(key).or_insert_with(|| json!(""));
    }
    for key in ["create_time", "like_count", "last_modify_ts"] {
        m.entry(key).or_insert_with(|| json!(0));
    }
    m
}

impl Forest {
    pub fn roots(&self) -> impl ExactSizeIterator<Item = CommentRef<'_>> + '_ {
        self.roots.iter().map(move |&id| CommentRef { forest: self, id })
    }

    /// Synthesized parents, in the order they were created. Never roots.
    pub fn placeholders(&self) -> impl ExactSizeIterator<Item = CommentRef<'_>> + '_ {
        self.placeholders.iter().map(move |&id| CommentRef { forest: self, id })
    }

    /// Look up a real (non-placeholder) comment by id.
    pub fn get(&self, comment_id: &str) -> Option<CommentRef<'_>> {
        self.registry.get(comment_id).map(|&id| CommentRef { forest: self, id })
    }

    /// `None` if `id` did not come from this forest.
    pub fn node(&self, id: NodeId) -> Option<CommentRef<'_>> {
        (id.0 < self.nodes.len()).then_some(CommentRef { forest: self, id })
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Total nodes, placeholders included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct CommentRef<'f> {
    forest: &'f Forest,
    id: NodeId,
}

impl<'f> CommentRef<'f> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> &'f CommentNode {
        &self.forest.nodes[self.id.0]
    }

    pub fn record(&self) -> &'f CommentRecord {
        &self.node().record
    }

    pub fn comment_id(&self) -> &'f str {
        &self.node().record.comment_id
    }

    pub fn owner_id(&self) -> &'f str {
        &self.node().record.owner_id
    }

    pub fn is_placeholder(&self) -> bool {
        self.node().placeholder
    }

    /// Direct replies, in the order their records were visited.
    pub fn replies(&self) -> impl ExactSizeIterator<Item = CommentRef<'f>> + 'f {
        let forest = self.forest;
        self.node().replies.iter().map(move |&id| CommentRef { forest, id })
    }

    /// Pre-order walk of this node and everything below it.
    pub fn walk(&self) -> impl Iterator<Item = CommentRef<'f>> + 'f {
        let forest = self.forest;
        let mut stack = vec![self.id];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(forest.nodes[id.0].replies.iter().rev().copied());
            Some(CommentRef { forest, id })
        })
    }
}

impl std::fmt::Debug for CommentRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentRef")
            .field("comment_id", &self.comment_id())
            .field("placeholder", &self.is_placeholder())
            .field("replies", &self.node().replies.len())
            .finish()
    }
}

/// A node at a known nesting level below the node being serialized.
struct Nested<'f> {
    node: CommentRef<'f>,
    depth: usize,
}

struct Replies<'f> {
    parent: CommentRef<'f>,
    depth: usize,
}

impl Serialize for Nested<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > MAX_REPLY_DEPTH {
            return Err(S::Error::custom(format!(
                "reply chain is nested deeper than {MAX_REPLY_DEPTH} levels at comment {}",
                self.node.comment_id()
            )));
        }
        let payload = &self.node.record().payload;
        let mut map = serializer.serialize_map(None)?;
        for (k, v) in payload.iter().filter(|(k, _)| k.as_str() != "replies") {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry("replies", &Replies { parent: self.node, depth: self.depth + 1 })?;
        map.end()
    }
}

impl Serialize for Replies<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let depth = self.depth;
        serializer.collect_seq(self.parent.replies().map(|node| Nested { node, depth }))
    }
}

/// Serializes as the original payload object with a `replies` array appended.
/// Fails once nesting passes [`MAX_REPLY_DEPTH`].
impl Serialize for CommentRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Nested { node: *self, depth: 0 }.serialize(serializer)
    }
}
