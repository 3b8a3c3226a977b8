use anyhow::Result;
use std::path::PathBuf;
use thread_etl::ThreadETL;

const DATA_ROOT: &str = "./data/bili/json";

/// thread-etl [export_dir] [out_file]
///
/// Picks the newest `<prefix>_contents_<date>.json` / `<prefix>_comments_<date>.json`
/// pair in `export_dir` and writes the integrated dataset (pretty JSON by default).
/// `THREAD_ETL_PREFIX` restricts the pair prefix (e.g. `creator`).
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let export_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DATA_ROOT));
    let out = args.next().map(PathBuf::from);
    let prefix = std::env::var("THREAD_ETL_PREFIX").ok().filter(|s| !s.trim().is_empty());
    let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(8);

    let summary = ThreadETL::new()
        .parallelism(hw)
        .progress(true)
        .integrate_latest_export(&export_dir, prefix.as_deref(), out.as_deref())?;

    println!("Integrated {} content items", summary.join.content_items);
    println!("Root comments attached: {}", summary.join.attached_roots);
    if summary.join.unmatched_roots > 0 {
        println!("Root comments without a content item: {}", summary.join.unmatched_roots);
    }
    println!("Output: {}", summary.output.display());
    Ok(())
}
