#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thread_etl::{parse_comments, parse_contents, CommentRecord, ContentItem, FieldNames, Forest, IntegrateOptions};

/// A crawler-style comment row. `parent` of `"0"` marks a top-level comment.
pub fn comment(id: &str, parent: &str, video: &str) -> Value {
    json!({
        "comment_id": id,
        "parent_comment_id": parent,
        "video_id": video,
        "content": format!("text of {id}"),
        "nickname": "someone",
        "like_count": 1
    })
}

/// A single reply chain c0 <- c1 <- ... <- c{n-1}, listed deepest first.
pub fn chain(n: usize) -> Vec<Value> {
    (0..n)
        .rev()
        .map(|i| {
            let parent = if i == 0 { "0".to_string() } else { format!("c{}", i - 1) };
            comment(&format!("c{i}"), &parent, "v1")
        })
        .collect()
}

pub fn video(id: &str, title: &str) -> Value {
    json!({ "video_id": id, "title": title, "desc": "", "liked_count": "3" })
}

pub fn records(values: Vec<Value>) -> Vec<CommentRecord> {
    parse_comments(values, &IntegrateOptions::default()).unwrap()
}

pub fn items(values: Vec<Value>) -> Vec<ContentItem> {
    parse_contents(values, &FieldNames::default()).unwrap()
}

/// Every (parent, child) link reachable from roots and placeholders.
pub fn edges(forest: &Forest) -> BTreeSet<(String, String)> {
    let mut out = BTreeSet::new();
    for top in forest.roots().chain(forest.placeholders()) {
        for node in top.walk() {
            for reply in node.replies() {
                out.insert((node.comment_id().to_string(), reply.comment_id().to_string()));
            }
        }
    }
    out
}

/// Ids of real (non-placeholder) comments reachable from roots and placeholders.
pub fn reachable_ids(forest: &Forest) -> Vec<String> {
    forest
        .roots()
        .chain(forest.placeholders())
        .flat_map(|top| top.walk())
        .filter(|n| !n.is_placeholder())
        .map(|n| n.comment_id().to_string())
        .collect()
}

pub fn write_json_array(path: &Path, values: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    serde_json::to_writer_pretty(f, values).unwrap();
}

pub fn write_ndjson(path: &Path, values: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for v in values {
        writeln!(&mut f, "{}", v).unwrap();
        // blank lines must be tolerated
        writeln!(&mut f).unwrap();
    }
}

/// Write a compressed `.zst` file containing one JSON value per line.
pub fn write_zst_lines(path: &Path, values: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for v in values {
        writeln!(&mut enc, "{}", v).unwrap();
    }
    enc.finish().unwrap();
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_reader(BufReader::new(File::open(path).unwrap())).unwrap()
}

/// Read a JSONL file into values (skips empty lines).
pub fn read_jsonl_values(path: &Path) -> Vec<Value> {
    let r = BufReader::new(File::open(path).unwrap());
    r.lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.trim().is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

/// Decompress a `.zst` file and parse each line.
pub fn decompress_zst_values(path: &Path) -> Vec<Value> {
    let dec = zstd::stream::read::Decoder::new(File::open(path).unwrap()).unwrap();
    BufReader::new(dec)
        .lines()
        .map(|l| l.unwrap())
        .filter(|s| !s.is_empty())
        .map(|s| serde_json::from_str(&s).unwrap())
        .collect()
}

/// The comments used by most export fixtures:
///   v1: c1 (root) <- c2 <- c4, plus c3 root
///   v2: nothing
///   v3: c5 root
///   v9: c6 root (no such video)
///   c7 replies to c404, which was never collected
/// Listed out of order so replies show up before their parents.
pub fn fixture_comments() -> Vec<Value> {
    vec![
        comment("c4", "c2", "v1"),
        comment("c2", "c1", "v1"),
        comment("c1", "0", "v1"),
        comment("c5", "0", "v3"),
        comment("c3", "0", "v1"),
        comment("c6", "0", "v9"),
        comment("c7", "c404", "v1"),
    ]
}

pub fn fixture_videos() -> Vec<Value> {
    vec![video("v1", "first"), video("v2", "second"), video("v3", "third")]
}

/// An export directory with two complete days and one half day:
/// - creator_*_2025-12-13.json : one video, no comments (older)
/// - creator_*_2025-12-14.json : the fixture videos/comments (newest complete)
/// - search_contents_2025-12-20.json : no comments file, must be ignored
pub fn make_export_dir() -> PathBuf {
    let base = tempfile::tempdir().unwrap().into_path();
    write_json_array(&base.join("creator_contents_2025-12-13.json"), &[video("old", "old")]);
    write_json_array(&base.join("creator_comments_2025-12-13.json"), &[]);
    write_json_array(&base.join("creator_contents_2025-12-14.json"), &fixture_videos());
    write_json_array(&base.join("creator_comments_2025-12-14.json"), &fixture_comments());
    write_json_array(&base.join("search_contents_2025-12-20.json"), &[video("s1", "lonely")]);
    base
}
