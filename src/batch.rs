//! Batch orchestrator: drives the walker across a list of input documents,
//! one document at a time, and emits exactly one result per input.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver};
use lopdf::Document;
use tempfile::TempPath;

use crate::config::TransformConfig;
use crate::error::ShrinkError;
use crate::report::{BatchReport, DocumentResult};
use crate::walker::{self, WalkStats};

/// File name prefix for directory-policy outputs.
pub const OUTPUT_PREFIX: &str = "komprimiert_";

/// Where compressed documents end up.
#[derive(Debug, Clone)]
pub enum OutputPolicy {
    /// Write to a temp file, then atomically replace the original.
    OverwriteOriginals,
    /// Write `komprimiert_<name>` into the given directory; originals stay
    /// untouched.
    WriteToDirectory(PathBuf),
}

/// Process the inputs strictly in order, invoking `on_result` after each
/// document. Every input yields exactly one result; individual failures never
/// end the batch.
pub fn run_batch(
    inputs: &[PathBuf],
    config: &TransformConfig,
    policy: &OutputPolicy,
    mut on_result: impl FnMut(&DocumentResult),
) -> BatchReport {
    let config = config.normalized();
    let started = Instant::now();

    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        let result = process_document(input, &config, policy);
        on_result(&result);
        results.push(result);
    }

    BatchReport {
        results,
        elapsed: started.elapsed(),
    }
}

/// Handle to a batch run executing on the background worker.
pub struct BatchHandle {
    progress: Arc<AtomicUsize>,
    total: usize,
    results: Receiver<DocumentResult>,
    worker: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Number of documents finished so far. Increases by one per document up
    /// to [`BatchHandle::total`].
    pub fn completed(&self) -> usize {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Per-document results, delivered in input order as each document
    /// finishes.
    pub fn results(&self) -> &Receiver<DocumentResult> {
        &self.results
    }

    /// Block until the whole batch has finished.
    pub fn wait(self) -> BatchReport {
        self.worker.join().expect("batch worker panicked")
    }
}

/// Run the batch on a single dedicated worker thread so the caller is never
/// blocked. Documents are still processed strictly one at a time.
pub fn spawn_batch(
    inputs: Vec<PathBuf>,
    config: TransformConfig,
    policy: OutputPolicy,
) -> BatchHandle {
    let progress = Arc::new(AtomicUsize::new(0));
    let total = inputs.len();
    let (sender, receiver) = unbounded();

    let worker_progress = Arc::clone(&progress);
    let worker = thread::spawn(move || {
        run_batch(&inputs, &config, &policy, |result| {
            // Bump before publishing so a caller holding the k-th result
            // always observes at least k completed documents. A disconnected
            // receiver is fine; the report still collects everything.
            worker_progress.fetch_add(1, Ordering::SeqCst);
            let _ = sender.send(result.clone());
        })
    });

    BatchHandle {
        progress,
        total,
        results: receiver,
        worker,
    }
}

/// One-shot preview output. The scratch file is removed when the handle is
/// dropped.
pub struct Preview {
    path: TempPath,
    pub result: DocumentResult,
}

impl Preview {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run the identical per-document pipeline, but always write to a scratch
/// file. Originals are never touched and the directory-output policy is never
/// consulted.
pub fn preview_document(
    input: &Path,
    config: &TransformConfig,
) -> Result<Preview, ShrinkError> {
    validate_input(input)?;
    let original_size = fs::metadata(input)?.len();

    let scratch = tempfile::Builder::new()
        .prefix("preview_compressed_")
        .suffix(".pdf")
        .tempfile()?
        .into_temp_path();

    let stats = shrink_document(input, &scratch, &config.normalized())?;
    let output_size = fs::metadata(&scratch)?.len();

    Ok(Preview {
        path: scratch,
        result: DocumentResult::compressed(input.to_path_buf(), original_size, output_size, stats),
    })
}

/// Open, rewrite, and save a single document.
pub fn shrink_document(
    input: &Path,
    output: &Path,
    config: &TransformConfig,
) -> Result<WalkStats, ShrinkError> {
    let mut doc = Document::load(input).map_err(|e| ShrinkError::Load {
        path: input.to_path_buf(),
        message: e.to_string(),
    })?;

    let stats = walker::rewrite_images(&mut doc, config);

    doc.save(output).map_err(|e| ShrinkError::Save {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(stats)
}

fn process_document(
    input: &Path,
    config: &TransformConfig,
    policy: &OutputPolicy,
) -> DocumentResult {
    let original_size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);

    match try_process(input, config, policy) {
        Ok((output_size, stats)) => {
            log::info!(
                "{}: {} -> {} bytes ({} of {} images rewritten)",
                input.display(),
                original_size,
                output_size,
                stats.rewritten,
                stats.examined
            );
            DocumentResult::compressed(input.to_path_buf(), original_size, output_size, stats)
        }
        Err(e) => {
            log::warn!("{}: {}", input.display(), e);
            DocumentResult::failed(input.to_path_buf(), original_size, e.to_string())
        }
    }
}

fn try_process(
    input: &Path,
    config: &TransformConfig,
    policy: &OutputPolicy,
) -> Result<(u64, WalkStats), ShrinkError> {
    validate_input(input)?;

    match policy {
        OutputPolicy::OverwriteOriginals => {
            // Stage into the system temp dir so the original stays readable
            // until the new file is complete. The TempPath guard removes the
            // staging file on every failure path.
            let staging = tempfile::Builder::new()
                .prefix("temp_compressed_")
                .suffix(".pdf")
                .tempfile()?
                .into_temp_path();

            let stats = shrink_document(input, &staging, config)?;
            let output_size = fs::metadata(&staging)?.len();

            replace_original(staging, input)?;

            Ok((output_size, stats))
        }
        OutputPolicy::WriteToDirectory(dir) => {
            let name = input
                .file_name()
                .ok_or_else(|| ShrinkError::InvalidInput(input.to_path_buf()))?;
            let output = dir.join(format!("{}{}", OUTPUT_PREFIX, name.to_string_lossy()));

            let stats = shrink_document(input, &output, config)?;
            let output_size = fs::metadata(&output)?.len();

            Ok((output_size, stats))
        }
    }
}

/// Move the staged output over the original. Rename first; when the temp dir
/// and the original live on different filesystems the rename fails (EXDEV),
/// so fall back to copying the staged bytes across. The `TempPath` guard
/// removes the staging file on every path out of here.
fn replace_original(staging: TempPath, input: &Path) -> Result<(), ShrinkError> {
    match staging.persist(input) {
        Ok(()) => Ok(()),
        Err(persist_err) => {
            let tempfile::PathPersistError { error, path: staging } = persist_err;
            copy_into_place(staging, input, error)
        }
    }
}

fn copy_into_place(
    staging: TempPath,
    input: &Path,
    rename_error: io::Error,
) -> Result<(), ShrinkError> {
    fs::copy(&staging, input).map_err(|copy_err| ShrinkError::Replace {
        path: input.to_path_buf(),
        message: format!("{} (rename: {})", copy_err, rename_error),
    })?;
    Ok(())
}

fn validate_input(input: &Path) -> Result<(), ShrinkError> {
    let is_pdf = input
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if !is_pdf || !input.is_file() {
        return Err(ShrinkError::InvalidInput(input.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn staged_bytes(content: &[u8]) -> (TempPath, PathBuf) {
        let mut file = tempfile::Builder::new()
            .prefix("temp_compressed_")
            .suffix(".pdf")
            .tempfile()
            .unwrap();
        file.write_all(content).unwrap();
        let staging = file.into_temp_path();
        let path = staging.to_path_buf();
        (staging, path)
    }

    #[test]
    fn replace_original_swaps_content_and_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        fs::write(&input, b"old bytes").unwrap();
        let (staging, staging_path) = staged_bytes(b"new bytes");

        replace_original(staging, &input).unwrap();

        assert_eq!(fs::read(&input).unwrap(), b"new bytes");
        assert!(!staging_path.exists());
    }

    #[test]
    fn cross_filesystem_fallback_copies_and_cleans_up() {
        // Exercises the path taken when the rename comes back EXDEV because
        // the temp dir and the original sit on different filesystems.
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        fs::write(&input, b"old bytes").unwrap();
        let (staging, staging_path) = staged_bytes(b"compressed output");

        let rename_error =
            io::Error::new(io::ErrorKind::Other, "Invalid cross-device link (os error 18)");
        copy_into_place(staging, &input, rename_error).unwrap();

        assert_eq!(fs::read(&input).unwrap(), b"compressed output");
        assert!(!staging_path.exists());
    }

    #[test]
    fn failed_swap_reports_and_leaves_no_staging_debris() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory missing, so both rename and copy must fail.
        let input = dir.path().join("no_such_dir").join("doc.pdf");
        let (staging, staging_path) = staged_bytes(b"compressed output");

        let err = replace_original(staging, &input).unwrap_err();
        assert!(matches!(err, ShrinkError::Replace { .. }));
        assert!(!staging_path.exists());
    }
}
