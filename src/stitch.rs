//! Output writer for integrated records: one JSON array, NDJSON, or zstd NDJSON.
//! Records are streamed to a temp file next to the target and promoted
//! atomically on `finish`, so a failed run never leaves a half-written output.
//! A writer dropped before `finish` succeeds removes its temp file.

use crate::config::OutputFormat;
use crate::ndjson::NdjsonWriter;
use crate::util::remove_with_backoff;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct RecordWriter {
    out: NdjsonWriter,
    tmp_path: PathBuf,
    final_path: PathBuf,
    format: OutputFormat,
    written: u64,
    promoted: bool,
}

pub(crate) fn tmp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path.file_name().and_then(|s| s.to_str()).unwrap_or("output");
    final_path.with_file_name(format!(".{name}.part"))
}

impl RecordWriter {
    pub fn create(final_path: &Path, format: OutputFormat, write_buf: usize) -> Result<Self> {
        if let Some(dir) = final_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let tmp_path = tmp_path_for(final_path);
        let out = match format {
            OutputFormat::Zst => NdjsonWriter::create_zst(&tmp_path, write_buf),
            _ => NdjsonWriter::create(&tmp_path, write_buf),
        }
        .with_context(|| format!("create {}", tmp_path.display()))?;

        let mut w = Self { out, tmp_path, final_path: final_path.to_path_buf(), format, written: 0, promoted: false };
        if let OutputFormat::Json { pretty } = format {
            w.out.write_raw(if pretty { b"[\n" } else { b"[" })?;
        }
        Ok(w)
    }

    pub fn write<T: Serialize + ?Sized>(&mut self, rec: &T) -> Result<()> {
        match self.format {
            OutputFormat::Json { pretty } => {
                if self.written > 0 {
                    self.out.write_raw(if pretty { b",\n" } else { b"," })?;
                }
                self.out.write_value_bare(rec, pretty)?;
            }
            OutputFormat::Jsonl | OutputFormat::Zst => self.out.write_value(rec)?,
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Close the array (if any), flush, and move the temp file into place.
    pub fn finish(mut self) -> Result<PathBuf> {
        if let OutputFormat::Json { pretty } = self.format {
            let close: &[u8] = match (pretty, self.written) {
                (true, 0) => b"]\n",
                (true, _) => b"\n]\n",
                (false, _) => b"]",
            };
            self.out.write_raw(close)?;
        }
        self.out.finish_atomic(&self.final_path)?;
        self.promoted = true;
        Ok(std::mem::take(&mut self.final_path))
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if self.promoted {
            return;
        }
        self.out.abandon();
        if let Err(e) = remove_with_backoff(&self.tmp_path, 4, 25) {
            tracing::warn!("leaving partial output behind: {e:#}");
        } else {
            tracing::debug!(path = %self.tmp_path.display(), "removed unfinished output");
        }
    }
}
