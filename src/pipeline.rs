use crate::config::{FieldNames, IntegrateOptions, OutputFormat};
use crate::error::ThreadError;
use crate::integrate::{integrate_each, IntegrateStats, MetadataView};
use crate::ndjson::load_json_records;
use crate::paths::latest_export_pair;
use crate::progress::ProgressScope;
use crate::record::{parse_comments, parse_contents, CommentRecord, ContentItem};
use crate::stitch::RecordWriter;
use crate::thread::{build_forest, BuildStats, Forest, MAX_REPLY_DEPTH};
use crate::util::init_tracing_once;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Builder-style entry point: load both collections, rebuild the threads,
/// join them onto their content items and write the result.
#[derive(Clone, Default)]
pub struct ThreadETL {
    pub(crate) opts: IntegrateOptions,
}

/// What one integration run produced.
#[derive(Clone, Debug)]
pub struct IntegrationSummary {
    pub output: PathBuf,
    pub records_written: u64,
    pub build: BuildStats,
    pub join: IntegrateStats,
}

impl ThreadETL {
    pub fn new() -> Self {
        Self { opts: IntegrateOptions::default() }
    }

    pub fn with_options(opts: IntegrateOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &IntegrateOptions {
        &self.opts
    }

    // -------- Builder methods --------
    pub fn fields(mut self, fields: FieldNames) -> Self { self.opts = self.opts.with_fields(fields); self }
    pub fn comment_id_field(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_comment_id_field(name); self }
    pub fn parent_id_field(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_parent_id_field(name); self }
    pub fn owner_id_field(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_owner_id_field(name); self }
    pub fn content_id_field(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_content_id_field(name); self }
    pub fn root_sentinels<I, S>(mut self, s: I) -> Self where I: IntoIterator<Item = S>, S: AsRef<str> { self.opts = self.opts.with_root_sentinels(s); self }
    pub fn metadata_fields<I, S>(mut self, f: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> { self.opts = self.opts.with_metadata_fields(f); self }
    pub fn output_format(mut self, format: OutputFormat) -> Self { self.opts = self.opts.with_output_format(format); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }

    fn init_runtime(&self) {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism {
            if n > 0 { rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok(); }
        }
    }

    // -------- Operations --------

    pub fn load_comments(&self, path: &Path) -> Result<Vec<CommentRecord>> {
        self.init_runtime();
        let raw = load_json_records(path, self.opts.read_buffer_bytes)?;
        parse_comments(raw, &self.opts).with_context(|| format!("validate comments in {}", path.display()))
    }

    pub fn load_contents(&self, path: &Path) -> Result<Vec<ContentItem>> {
        self.init_runtime();
        let raw = load_json_records(path, self.opts.read_buffer_bytes)?;
        parse_contents(raw, &self.opts.fields).with_context(|| format!("validate content items in {}", path.display()))
    }

    pub fn build_forest(&self, comments: Vec<CommentRecord>) -> Forest {
        build_forest(comments, &self.opts.fields)
    }

    pub fn metadata_view(&self) -> MetadataView<'_> {
        MetadataView { id_field: &self.opts.fields.content_id, keep: self.opts.metadata_fields.as_deref() }
    }

    /// Join already-loaded collections and stream the result to `out_path`.
    /// Fails before creating any file when the threads nest too deep to write.
    pub fn integrate_to_file(&self, contents: Vec<ContentItem>, forest: &Forest, out_path: &Path) -> Result<IntegrationSummary> {
        let depth = forest.stats().max_depth;
        if depth > MAX_REPLY_DEPTH {
            return Err(ThreadError::ReplyChainTooDeep { depth, max: MAX_REPLY_DEPTH })
                .with_context(|| format!("write {}", out_path.display()));
        }
        let mut writer = RecordWriter::create(out_path, self.opts.output_format, self.opts.write_buffer_bytes)?;
        let label = self.opts.progress_label.clone().unwrap_or_else(|| "Integrating".to_string());
        let pb = ProgressScope::count_if(self.opts.progress, label, contents.len() as u64);

        let join = integrate_each(contents, forest, self.metadata_view(), |rec| -> Result<()> {
            writer.write(&rec).with_context(|| format!("write content {}", rec.content_id))?;
            if let Some(pb) = &pb { pb.inc_items(1); }
            Ok(())
        })?;

        let records_written = writer.written();
        let output = writer.finish()?;
        if let Some(pb) = pb { pb.finish("done"); }

        Ok(IntegrationSummary { output, records_written, build: *forest.stats(), join })
    }

    /// Full run over a contents file and a comments file.
    pub fn integrate_files(&self, contents_path: &Path, comments_path: &Path, out_path: &Path) -> Result<IntegrationSummary> {
        self.init_runtime();
        let contents = self.load_contents(contents_path)?;
        let comments = self.load_comments(comments_path)?;
        tracing::info!(
            contents = contents.len(),
            comments = comments.len(),
            "Loaded {} and {}",
            contents_path.display(),
            comments_path.display()
        );

        let forest = self.build_forest(comments);
        let s = forest.stats();
        tracing::info!(
            roots = s.roots,
            placeholders = s.placeholders,
            cycles_broken = s.cycles_broken,
            duplicates = s.duplicates,
            "Built comment threads"
        );
        if s.placeholders > 0 {
            tracing::warn!("{} replies point at parents missing from the input; kept under placeholders", s.placeholders);
        }

        let summary = self.integrate_to_file(contents, &forest, out_path)?;
        tracing::info!(
            output = %summary.output.display(),
            content_items = summary.join.content_items,
            attached_roots = summary.join.attached_roots,
            unmatched_roots = summary.join.unmatched_roots,
            "Integration complete"
        );
        Ok(summary)
    }

    /// Locate the newest contents/comments pair in `export_dir` and integrate
    /// it. `out_path` defaults to `<export_dir>/integrated_result.json`.
    pub fn integrate_latest_export(&self, export_dir: &Path, prefix: Option<&str>, out_path: Option<&Path>) -> Result<IntegrationSummary> {
        self.init_runtime();
        let pair = latest_export_pair(export_dir, prefix)
            .ok_or_else(|| anyhow!("no contents/comments export pair found in {}", export_dir.display()))?;
        tracing::info!(prefix = %pair.prefix, date = %pair.date, "Selected export pair");
        let out = out_path.map(Path::to_path_buf).unwrap_or_else(|| export_dir.join("integrated_result.json"));
        self.integrate_files(&pair.contents, &pair.comments, &out)
    }
}
