#[path = "common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use std::collections::BTreeSet;
use thread_etl::{build_forest, integrate, parse_comments, FieldNames, IntegrateOptions, MetadataView, MAX_REPLY_DEPTH};

/// Basic case: c1 is a root, c2 replies to c1, c3 replies to a
/// comment that was never collected.
/// Outcome: roots == [c1], c1 holds c2, and a placeholder "c9" holds c3
/// without itself becoming a root.
#[test]
fn builds_roots_replies_and_placeholders() {
    let forest = build_forest(
        records(vec![comment("c1", "0", "v1"), comment("c2", "c1", "v1"), comment("c3", "c9", "v1")]),
        &FieldNames::default(),
    );

    let roots: Vec<&str> = forest.roots().map(|r| r.comment_id()).collect();
    assert_eq!(roots, vec!["c1"]);

    let c1 = forest.get("c1").unwrap();
    let replies: Vec<&str> = c1.replies().map(|r| r.comment_id()).collect();
    assert_eq!(replies, vec!["c2"]);

    let placeholders: Vec<_> = forest.placeholders().collect();
    assert_eq!(placeholders.len(), 1);
    let ph = placeholders[0];
    assert!(ph.is_placeholder());
    assert_eq!(ph.comment_id(), "c9");
    assert_eq!(ph.owner_id(), "v1", "placeholder inherits the owner of the reply that exposed it");
    assert_eq!(ph.replies().map(|r| r.comment_id()).collect::<Vec<_>>(), vec!["c3"]);
    assert!(forest.get("c9").is_none(), "placeholders are not registered as real comments");

    let stats = forest.stats();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.comments, 3);
    assert_eq!(stats.roots, 1);
    assert_eq!(stats.placeholders, 1);
    assert_eq!(stats.cycles_broken, 0);
}

/// Replies listed before their parents (deepest first) still end up under
/// the right node: the parent reached through the registry and the parent
/// visited later as a root are the same node.
#[test]
fn forward_references_attach_to_the_same_node() {
    let forest = build_forest(
        records(vec![
            comment("d", "c", "v1"),
            comment("c", "b", "v1"),
            comment("b", "a", "v1"),
            comment("a", "0", "v1"),
        ]),
        &FieldNames::default(),
    );

    let chain: Vec<&str> = forest.roots().next().unwrap().walk().map(|n| n.comment_id()).collect();
    assert_eq!(chain, vec!["a", "b", "c", "d"]);

    // Looking the intermediate node up directly shows the reply attached earlier.
    let b = forest.get("b").unwrap();
    assert_eq!(b.replies().map(|r| r.comment_id()).collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(forest.len(), 4, "no duplicate node was created for any parent");

    // Handles resolve back to the same node; foreign ones are rejected.
    let b_id = b.id();
    assert!(b_id.index() < forest.len());
    assert_eq!(forest.node(b_id).unwrap().comment_id(), "b");
    let other = build_forest(records(vec![comment("z", "0", "v1")]), &FieldNames::default());
    assert!(other.node(b_id).is_none());
    assert_eq!(forest.stats().max_depth, 3);
}

/// Shuffling the input keeps the same parent/child links, and every comment
/// is reachable exactly once.
#[test]
fn order_independent_and_lossless() {
    let input = fixture_comments();
    let n = input.len();
    let baseline = build_forest(records(input.clone()), &FieldNames::default());
    let want = edges(&baseline);

    let mut reversed = input.clone();
    reversed.reverse();
    let mut rotated = input.clone();
    rotated.rotate_left(3);
    let mut interleaved: Vec<_> = input.iter().step_by(2).cloned().collect();
    interleaved.extend(input.iter().skip(1).step_by(2).cloned());

    for shuffled in [input, reversed, rotated, interleaved] {
        let forest = build_forest(records(shuffled), &FieldNames::default());
        assert_eq!(edges(&forest), want);

        let roots: BTreeSet<&str> = forest.roots().map(|r| r.comment_id()).collect();
        assert_eq!(roots, BTreeSet::from(["c1", "c3", "c5", "c6"]));

        let ids = reachable_ids(&forest);
        let distinct: BTreeSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), n, "each comment is reached exactly once");
        assert_eq!(distinct.len(), n);
    }
}

/// Children attach in the order their records are visited.
#[test]
fn replies_keep_input_order() {
    let forest = build_forest(
        records(vec![
            comment("r2", "p", "v1"),
            comment("p", "0", "v1"),
            comment("r1", "p", "v1"),
            comment("r3", "p", "v1"),
        ]),
        &FieldNames::default(),
    );
    let p = forest.get("p").unwrap();
    assert_eq!(p.replies().map(|r| r.comment_id()).collect::<Vec<_>>(), vec!["r2", "r1", "r3"]);
}

/// A comment naming itself as parent is parked under a placeholder instead
/// of becoming its own child.
#[test]
fn self_reference_is_treated_as_missing_parent() {
    let forest = build_forest(records(vec![comment("s", "s", "v1")]), &FieldNames::default());

    assert_eq!(forest.roots().len(), 0);
    let ph: Vec<_> = forest.placeholders().collect();
    assert_eq!(ph.len(), 1);
    assert_eq!(ph[0].replies().map(|r| r.comment_id()).collect::<Vec<_>>(), vec!["s"]);
    assert_eq!(forest.get("s").unwrap().replies().len(), 0);
    assert_eq!(forest.stats().cycles_broken, 1);
    assert_eq!(forest.stats().placeholders, 0);
}

/// a -> b -> a: the second link would close a loop, so b is parked under a
/// placeholder and the walk terminates with both comments visited once.
#[test]
fn parent_cycles_are_broken() {
    let forest = build_forest(records(vec![comment("a", "b", "v1"), comment("b", "a", "v1")]), &FieldNames::default());

    assert_eq!(forest.stats().cycles_broken, 1);
    let walked: Vec<(bool, &str)> = forest
        .placeholders()
        .flat_map(|p| p.walk())
        .map(|n| (n.is_placeholder(), n.comment_id()))
        .collect();
    assert_eq!(walked, vec![(true, "a"), (false, "b"), (false, "a")]);
}

/// Duplicate ids are last-wins; the surviving record keeps the first position.
#[test]
fn duplicate_ids_keep_the_later_record() {
    let mut old = comment("c1", "0", "v1");
    old["content"] = json!("old");
    let mut new = comment("c1", "0", "v1");
    new["content"] = json!("new");
    let forest = build_forest(
        records(vec![old, comment("c0", "0", "v1"), comment("c2", "c1", "v1"), new]),
        &FieldNames::default(),
    );

    assert_eq!(forest.stats().duplicates, 1);
    assert_eq!(forest.stats().comments, 3);
    let roots: Vec<&str> = forest.roots().map(|r| r.comment_id()).collect();
    assert_eq!(roots, vec!["c1", "c0"]);
    let c1 = forest.get("c1").unwrap();
    assert_eq!(c1.record().payload["content"], json!("new"));
    assert_eq!(c1.replies().map(|r| r.comment_id()).collect::<Vec<_>>(), vec!["c2"]);
}

/// Numeric ids and a numeric `0` parent behave like their string forms;
/// integral floats (`0.0`, `100.0`) count as the same integers.
#[test]
fn numeric_ids_and_sentinel() {
    let raw = vec![
        json!({"comment_id": 100, "parent_comment_id": 0, "video_id": 7}),
        json!({"comment_id": "101", "parent_comment_id": 100, "video_id": "7"}),
        json!({"comment_id": 102, "video_id": 7}),
        json!({"comment_id": 103, "parent_comment_id": 0.0, "video_id": 7}),
        json!({"comment_id": 104.0, "parent_comment_id": 100.0, "video_id": 7.0}),
    ];
    let forest = build_forest(records(raw), &FieldNames::default());

    let roots: Vec<&str> = forest.roots().map(|r| r.comment_id()).collect();
    assert_eq!(roots, vec!["100", "102", "103"], "a missing parent field counts as top-level");
    assert_eq!(forest.placeholders().len(), 0, "0.0 is the root marker, not a missing parent");
    let replies: Vec<&str> = forest.get("100").unwrap().replies().map(|r| r.comment_id()).collect();
    assert_eq!(replies, vec!["101", "104"]);
    assert_eq!(forest.get("101").unwrap().owner_id(), "7");
    assert_eq!(forest.get("104").unwrap().owner_id(), "7");

    let (out, _) = integrate(items(vec![json!({"video_id": 7})]), &forest, MetadataView::default());
    assert_eq!(out[0].comment_forest.len(), 3);
}

/// Field names and sentinels come from configuration, not from the code.
#[test]
fn custom_fields_and_sentinels() {
    let opts = IntegrateOptions::default()
        .with_comment_id_field("id")
        .with_parent_id_field("parent")
        .with_owner_id_field("post")
        .with_root_sentinels(["root", "0"]);
    let raw = vec![
        json!({"id": "x", "parent": "root", "post": "p1"}),
        json!({"id": "y", "parent": "x", "post": "p1"}),
        json!({"id": "z", "parent": 0, "post": "p1"}),
        json!({"id": "w", "parent": "gone", "post": "p1"}),
    ];
    let parsed = parse_comments(raw, &opts).unwrap();
    let top_level: Vec<bool> = parsed.iter().map(|r| r.is_root()).collect();
    assert_eq!(top_level, vec![true, false, true, false]);
    let forest = build_forest(parsed, &opts.fields);

    let roots: Vec<&str> = forest.roots().map(|r| r.comment_id()).collect();
    assert_eq!(roots, vec!["x", "z"]);

    let ph = forest.placeholders().next().unwrap();
    let payload = &ph.record().payload;
    assert_eq!(payload["id"], json!("gone"));
    assert_eq!(payload["parent"], json!("0"));
    assert_eq!(payload["post"], json!("p1"));
}

/// Nodes serialize as their original payload plus a nested `replies` array;
/// placeholders carry an empty comment body.
#[test]
fn serializes_nested_replies() {
    let forest = build_forest(
        records(vec![comment("c1", "0", "v1"), comment("c2", "c1", "v1"), comment("c3", "c9", "v1")]),
        &FieldNames::default(),
    );

    let root = serde_json::to_value(forest.roots().next().unwrap()).unwrap();
    assert_eq!(root["comment_id"], json!("c1"));
    assert_eq!(root["content"], json!("text of c1"));
    assert_eq!(root["replies"][0]["comment_id"], json!("c2"));
    assert_eq!(root["replies"][0]["replies"], json!([]));

    let ph = serde_json::to_value(forest.placeholders().next().unwrap()).unwrap();
    assert_eq!(ph["comment_id"], json!("c9"));
    assert_eq!(ph["parent_comment_id"], json!("0"));
    assert_eq!(ph["video_id"], json!("v1"));
    assert_eq!(ph["content"], json!(""));
    assert_eq!(ph["like_count"], json!(0));
    assert_eq!(ph["replies"][0]["comment_id"], json!("c3"));
}

/// Reply chains far deeper than the output nesting limit build and walk
/// without recursion. Serializing one is an error instead of a crash, while a
/// chain exactly at the limit still serializes.
#[test]
fn deep_reply_chains() {
    let n = 30_000;
    let forest = build_forest(records(chain(n)), &FieldNames::default());
    assert_eq!(forest.stats().max_depth, n - 1);
    let root = forest.roots().next().unwrap();
    assert_eq!(root.comment_id(), "c0");
    assert_eq!(root.walk().count(), n);

    let err = serde_json::to_vec(&root).unwrap_err();
    assert!(err.to_string().contains(&format!("nested deeper than {MAX_REPLY_DEPTH} levels")), "{err}");

    let at_limit = build_forest(records(chain(MAX_REPLY_DEPTH + 1)), &FieldNames::default());
    assert_eq!(at_limit.stats().max_depth, MAX_REPLY_DEPTH);
    assert!(serde_json::to_vec(&at_limit.roots().next().unwrap()).is_ok());
}

#[test]
fn empty_input_builds_empty_forest() {
    let forest = build_forest(Vec::new(), &FieldNames::default());
    assert!(forest.is_empty());
    assert_eq!(forest.roots().len(), 0);
    assert_eq!(forest.placeholders().len(), 0);
}
