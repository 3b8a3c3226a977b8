use crate::record::number_text;
use serde_json::Value;

/// Field names used to link comments to each other and to their content item.
/// These differ between crawler exports, so none of them are hard-coded in the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldNames {
    pub comment_id: String,
    pub parent_id: String,
    pub owner_id: String,   // on comments
    pub content_id: String, // on content items
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            comment_id: "comment_id".into(),
            parent_id: "parent_comment_id".into(),
            owner_id: "video_id".into(),
            content_id: "video_id".into(),
        }
    }
}

/// Output encoding for the integrated dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array holding every integrated record.
    Json { pretty: bool },
    /// One integrated record per line.
    Jsonl,
    /// NDJSON compressed with zstd.
    Zst,
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct IntegrateOptions {
    pub fields: FieldNames,
    pub root_sentinels: Vec<String>,        // compared against the stringified parent id
    pub metadata_fields: Option<Vec<String>>, // None keeps the whole content payload
    pub output_format: OutputFormat,
    pub parallelism: Option<usize>,         // Some(N) to set rayon threads, None to use default
    pub progress: bool,
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for IntegrateOptions {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            root_sentinels: vec!["0".to_string()],
            metadata_fields: None,
            output_format: OutputFormat::Json { pretty: true },
            parallelism: None,
            progress: true,
            progress_label: None,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl IntegrateOptions {
    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }
    pub fn with_comment_id_field(mut self, name: impl Into<String>) -> Self {
        self.fields.comment_id = name.into();
        self
    }
    pub fn with_parent_id_field(mut self, name: impl Into<String>) -> Self {
        self.fields.parent_id = name.into();
        self
    }
    pub fn with_owner_id_field(mut self, name: impl Into<String>) -> Self {
        self.fields.owner_id = name.into();
        self
    }
    pub fn with_content_id_field(mut self, name: impl Into<String>) -> Self {
        self.fields.content_id = name.into();
        self
    }
    /// Replace the accepted "no parent" markers. Values are trimmed; empty
    /// entries are dropped and an empty list falls back to `"0"`.
    pub fn with_root_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut v: Vec<String> = sentinels
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if v.is_empty() {
            v.push("0".to_string());
        }
        v.sort();
        v.dedup();
        self.root_sentinels = v;
        self
    }
    pub fn with_metadata_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }

    // IO buffers tuning
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    /// True when `parent` marks a top-level comment. Strings and numbers are
    /// compared by their decimal text, so `0`, `0.0` and `"0"` are the same marker.
    /// A missing or null parent counts as top-level.
    pub fn is_root_parent(&self, parent: Option<&Value>) -> bool {
        match parent {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => self.is_root_sentinel(s),
            Some(Value::Number(n)) => self.is_root_sentinel(&number_text(n)),
            Some(_) => false,
        }
    }

    pub fn is_root_sentinel(&self, id: &str) -> bool {
        let id = id.trim();
        self.root_sentinels.iter().any(|s| s == id)
    }
}
