use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use spesa_core::{ExtractionConfig, ReceiptRecord};
use spesa_ocr::{record_path, DetectionSource, ExtractionPipeline};

#[cfg(feature = "tesseract")]
use spesa_ocr::detector::tesseract_source::TesseractDetector;
#[cfg(not(feature = "tesseract"))]
use spesa_ocr::MockDetector;

/// File extensions accepted by batch and watch modes.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

fn usage() -> ! {
    eprintln!(
        "Usage:\n  \
         spesa <image> [--records <dir>] [--config <file>]\n  \
         spesa --batch <in_dir> <records_dir> [--config <file>]\n  \
         spesa --watch <in_dir> <records_dir> [--config <file>]"
    );
    std::process::exit(2);
}

#[cfg(feature = "tesseract")]
fn build_source() -> impl DetectionSource {
    TesseractDetector::new(None, "eng")
}

// The default build carries no OCR engine: extraction runs end to end
// but detects nothing. Build with `--features tesseract` for real input.
#[cfg(not(feature = "tesseract"))]
fn build_source() -> impl DetectionSource {
    warn!("built without the `tesseract` feature; detector is a no-op");
    MockDetector::empty()
}

/// Persist a record as indented UTF-8 JSON, the caller-provided save
/// function of the extraction contract.
fn save_record(path: &Path, record: &ReceiptRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut json = serde_json::to_string_pretty(record)?;
    json.push('\n');
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

async fn process_one<D: DetectionSource>(
    pipeline: &ExtractionPipeline<D>,
    path: &Path,
    records_dir: Option<&Path>,
) -> Result<()> {
    let result = pipeline
        .process_file(path)
        .await
        .with_context(|| format!("processing {}", path.display()))?;

    if result.outcome.usable_detections == 0 {
        warn!(path = %path.display(), "no text detected in image");
    }
    info!(
        path = %path.display(),
        elapsed_ms = result.elapsed_ms,
        confidence = result.outcome.confidence,
        category = %result.outcome.category,
        "processed receipt"
    );

    match records_dir {
        Some(dir) => {
            let dest = record_path(dir, &result.hash_hex);
            save_record(&dest, &result.outcome.record)?;
            info!(record = %dest.display(), "record saved");
        }
        None => println!("{}", serde_json::to_string_pretty(&result.outcome.record)?),
    }
    Ok(())
}

async fn run_batch<D: DetectionSource + 'static>(
    pipeline: Arc<ExtractionPipeline<D>>,
    in_dir: PathBuf,
    records_dir: PathBuf,
) -> Result<()> {
    let mut entries = tokio::fs::read_dir(&in_dir)
        .await
        .with_context(|| format!("reading {}", in_dir.display()))?;

    let mut tasks = tokio::task::JoinSet::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_image_file(&path) {
            continue;
        }
        let pipeline = Arc::clone(&pipeline);
        let records_dir = records_dir.clone();
        tasks.spawn(async move { process_one(&pipeline, &path, Some(&records_dir)).await });
    }

    let mut processed = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => processed += 1,
            Ok(Err(e)) => {
                failed += 1;
                warn!(error = %e, "batch item failed");
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "batch task panicked");
            }
        }
    }
    info!(processed, failed, "batch finished");
    Ok(())
}

async fn run_watch<D: DetectionSource>(
    pipeline: &ExtractionPipeline<D>,
    watch_dir: &Path,
    records_dir: &Path,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spesa_ocr::spawn_intake_watcher(watch_dir, tx)
        .with_context(|| format!("watching {}", watch_dir.display()))?;
    info!(dir = %watch_dir.display(), "watching for incoming receipts");

    while let Some(path) = rx.recv().await {
        if !is_image_file(&path) {
            continue;
        }
        if let Err(e) = process_one(pipeline, &path, Some(records_dir)).await {
            warn!(error = %e, path = %path.display(), "failed to process receipt");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config = match take_option(&mut args, "--config") {
        Some(path) => ExtractionConfig::load(Path::new(&path))
            .with_context(|| format!("loading config {path}"))?,
        None => ExtractionConfig::default(),
    };
    let records = take_option(&mut args, "--records").map(PathBuf::from);

    if args.is_empty() {
        usage();
    }

    match args[0].as_str() {
        "--batch" => {
            if args.len() != 3 {
                usage();
            }
            let pipeline = Arc::new(ExtractionPipeline::with_config(build_source(), config));
            run_batch(pipeline, PathBuf::from(&args[1]), PathBuf::from(&args[2])).await
        }
        "--watch" => {
            if args.len() != 3 {
                usage();
            }
            let pipeline = ExtractionPipeline::with_config(build_source(), config);
            run_watch(&pipeline, Path::new(&args[1]), Path::new(&args[2])).await
        }
        flag if flag.starts_with("--") => usage(),
        _ => {
            if args.len() != 1 {
                usage();
            }
            let path = PathBuf::from(&args[0]);
            if !path.exists() {
                bail!("no such file: {}", path.display());
            }
            let pipeline = ExtractionPipeline::with_config(build_source(), config);
            process_one(&pipeline, &path, records.as_deref()).await
        }
    }
}

/// Remove `--name <value>` from the argument list, returning the value.
fn take_option(args: &mut Vec<String>, name: &str) -> Option<String> {
    let idx = args.iter().position(|a| a == name)?;
    if idx + 1 >= args.len() {
        usage();
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Some(value)
}
