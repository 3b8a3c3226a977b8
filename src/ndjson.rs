use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder as ZstdEncoder;

fn is_zst(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("zst")
}

/// Buffered line reader over a plain or `.zst` file, with trailing `\r?\n` trimmed.
pub struct NdjsonReader {
    rdr: Box<dyn BufRead + Send>,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        let cap = buf_bytes.max(8 * 1024);
        let rdr: Box<dyn BufRead + Send> = if is_zst(path) {
            let mut dec = Decoder::new(f)?;
            // exports can be written with long windows
            dec.window_log_max(31)?;
            Box::new(BufReader::with_capacity(cap, dec))
        } else {
            Box::new(BufReader::with_capacity(cap, f))
        };
        Ok(Self { rdr })
    }

    /// Read the next line into `buf`. Returns the number of bytes read (0 on EOF).
    pub fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_line(buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') { buf.pop(); }
        }
        Ok(n)
    }

    /// Peek the first non-whitespace byte without consuming it.
    fn first_significant_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            let chunk = self.rdr.fill_buf()?;
            if chunk.is_empty() { return Ok(None); }
            match chunk.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(i) => {
                    let b = chunk[i];
                    self.rdr.consume(i);
                    return Ok(Some(b));
                }
                None => {
                    let n = chunk.len();
                    self.rdr.consume(n);
                }
            }
        }
    }
}

/// Load a collection of JSON records from `path`. Accepts either one JSON
/// array or NDJSON (one value per line, blank lines skipped); `.zst` files
/// are decompressed on the fly.
pub fn load_json_records(path: &Path, buf_bytes: usize) -> Result<Vec<Value>> {
    let mut rdr = NdjsonReader::open(path, buf_bytes).with_context(|| format!("open {}", path.display()))?;
    match rdr.first_significant_byte()? {
        None => Ok(Vec::new()),
        Some(b'[') => serde_json::from_reader(&mut rdr.rdr)
            .with_context(|| format!("parse JSON array {}", path.display())),
        Some(_) => {
            let mut out = Vec::new();
            let mut buf = String::with_capacity(16 * 1024);
            let mut line_no = 0usize;
            while rdr.read_line(&mut buf)? != 0 {
                line_no += 1;
                if buf.trim().is_empty() { continue; }
                let v: Value = serde_json::from_str(&buf)
                    .with_context(|| format!("parse {} line {}", path.display(), line_no))?;
                out.push(v);
            }
            Ok(out)
        }
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Zst(ZstdEncoder<'static, BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Zst(w) => w.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Zst(w) => w.flush(),
        }
    }
}

/// Buffered writer with robust file creation; compresses when the target
/// ends in `.zst`. Callers write whole values or raw bytes; `write_value`
/// appends the `\n` terminator.
pub struct NdjsonWriter {
    path: PathBuf,
    w: Option<Sink>,
}

impl NdjsonWriter {
    pub fn create(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = create_with_backoff(path, 16, 50)?;
        let bw = BufWriter::with_capacity(buf_bytes.max(8 * 1024), f);
        let sink = if is_zst(path) {
            Sink::Zst(ZstdEncoder::new(bw, 3)?)
        } else {
            Sink::Plain(bw)
        };
        Ok(Self { path: path.to_path_buf(), w: Some(sink) })
    }

    /// Same as `create`, but compresses regardless of the file name. Used for
    /// temp files that are promoted to a `.zst` name later.
    pub fn create_zst(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = create_with_backoff(path, 16, 50)?;
        let bw = BufWriter::with_capacity(buf_bytes.max(8 * 1024), f);
        Ok(Self { path: path.to_path_buf(), w: Some(Sink::Zst(ZstdEncoder::new(bw, 3)?)) })
    }

    pub fn write_value<T: serde::Serialize + ?Sized>(&mut self, v: &T) -> Result<()> {
        if let Some(w) = &mut self.w {
            serde_json::to_writer(&mut *w, v)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(w) = &mut self.w {
            w.write_all(bytes)?;
        }
        Ok(())
    }

    /// Serialize without a line terminator (for JSON array output).
    pub fn write_value_bare<T: serde::Serialize + ?Sized>(&mut self, v: &T, pretty: bool) -> Result<()> {
        if let Some(w) = &mut self.w {
            if pretty {
                serde_json::to_writer_pretty(&mut *w, v)?;
            } else {
                serde_json::to_writer(&mut *w, v)?;
            }
        }
        Ok(())
    }

    /// Flushes and atomically promotes the temp file to `final_path`.
    pub fn finish_atomic(&mut self, final_path: &Path) -> Result<()> {
        self.close()?;
        replace_file_atomic_backoff(&self.path, final_path)
    }

    /// Drop the open handle without flushing a zstd frame; the file is left as is.
    pub(crate) fn abandon(&mut self) {
        self.w = None;
    }

    fn close(&mut self) -> Result<()> {
        match self.w.take() {
            Some(Sink::Plain(mut w)) => w.flush().with_context(|| format!("flush {}", self.path.display()))?,
            Some(Sink::Zst(enc)) => {
                let mut w = enc.finish().with_context(|| format!("finish zstd {}", self.path.display()))?;
                w.flush().with_context(|| format!("flush {}", self.path.display()))?;
            }
            None => {}
        }
        Ok(())
    }
}
