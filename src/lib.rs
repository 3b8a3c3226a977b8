mod config;
mod error;
mod paths;
mod util;
mod progress;

mod record;
mod thread;
mod integrate;

mod ndjson;
mod stitch;
mod pipeline;

pub mod mapping;
pub mod store;

pub use crate::config::{FieldNames, IntegrateOptions, OutputFormat};
pub use crate::error::{RecordKind, ThreadError};
pub use crate::pipeline::{IntegrationSummary, ThreadETL};

// core: records, thread builder, integrator
pub use crate::record::{id_text, parse_comments, parse_contents, CommentRecord, ContentItem};
pub use crate::thread::{build_forest, BuildStats, CommentRef, Forest, NodeId, MAX_REPLY_DEPTH};
pub use crate::integrate::{integrate, integrate_each, IntegrateStats, IntegratedRecord, MetadataView};

// export discovery
pub use crate::paths::{discover_export_pairs, latest_export_pair, parse_export_date, ExportKind, ExportPair};

// IO helpers
pub use crate::ndjson::{load_json_records, NdjsonReader, NdjsonWriter};
pub use crate::stitch::RecordWriter;
pub use crate::progress::ProgressScope;
pub use crate::util::{init_tracing_once, open_with_backoff, create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
