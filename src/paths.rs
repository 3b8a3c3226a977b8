use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::Date;
use walkdir::WalkDir;

/// Which half of a crawler export a file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Contents, // <prefix>_contents_YYYY-MM-DD.json
    Comments, // <prefix>_comments_YYYY-MM-DD.json
}

/// A contents file and the comments file exported with it on the same day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPair {
    pub prefix: String, // "creator", "search", "detail", ...
    pub date: Date,
    pub contents: PathBuf,
    pub comments: PathBuf,
}

fn export_name_re() -> Regex {
    Regex::new(r"^([A-Za-z0-9]+)_(contents|comments)_(\d{4}-\d{2}-\d{2})\.(json|jsonl)(\.zst)?$").unwrap()
}

pub fn parse_export_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// Scan `dir` (non-recursive) for dated export files and pair them up.
/// Days where only one half exists are skipped.
pub fn discover_export_pairs(dir: &Path) -> Vec<ExportPair> {
    let re = export_name_re();
    let mut halves: BTreeMap<(Date, String), (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    if !dir.exists() {
        return Vec::new();
    }
    for ent in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let Some(name) = ent.file_name().to_str() else { continue };
        let Some(caps) = re.captures(name) else { continue };
        let Some(date) = parse_export_date(&caps[3]) else {
            tracing::debug!(file = name, "export file has an impossible date; ignoring");
            continue;
        };
        let kind = if &caps[2] == "contents" { ExportKind::Contents } else { ExportKind::Comments };
        let slot = halves.entry((date, caps[1].to_string())).or_default();
        let path = ent.path().to_path_buf();
        match kind {
            ExportKind::Contents => slot.0 = Some(path),
            ExportKind::Comments => slot.1 = Some(path),
        }
    }

    halves
        .into_iter()
        .filter_map(|((date, prefix), halves)| match halves {
            (Some(contents), Some(comments)) => Some(ExportPair { prefix, date, contents, comments }),
            _ => {
                tracing::debug!(%prefix, %date, "export day has only one of contents/comments; skipping");
                None
            }
        })
        .collect()
}

/// Newest complete pair, optionally restricted to one prefix.
pub fn latest_export_pair(dir: &Path, prefix: Option<&str>) -> Option<ExportPair> {
    discover_export_pairs(dir)
        .into_iter()
        .filter(|p| prefix.map_or(true, |want| p.prefix == want))
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.prefix.cmp(&b.prefix)))
}
