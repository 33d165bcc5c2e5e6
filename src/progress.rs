//! Progress reporting for upload batches.

use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::format::{format_bytes, truncate_filename};
use crate::uploader::UploadResult;

/// Receives batch events from the uploader. Every method defaults to a no-op.
pub trait UploadProgress {
    /// A directory source was enumerated.
    fn directory_scanned(&self, _dir: &Path, _count: usize) {}

    /// `count` more files will be processed.
    fn files_queued(&self, _count: usize) {}

    fn file_started(&self, _local: &Path, _remote: &str) {}

    fn file_finished(&self, _result: &UploadResult) {}

    /// The batch is complete.
    fn finished(&self) {}

    fn manifest_written(&self, _path: &Path) {}
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl UploadProgress for NoProgress {}

/// Verbose mode: a spinner while each file uploads, then one line per file.
#[derive(Debug, Default)]
pub struct SpinnerProgress {
    current: RefCell<Option<ProgressBar>>,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UploadProgress for SpinnerProgress {
    fn directory_scanned(&self, dir: &Path, count: usize) {
        println!(
            "{}",
            format!("Found {} file(s) to upload from {}", count, dir.display()).blue()
        );
    }

    fn file_started(&self, local: &Path, remote: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Uploading {} → {}", local.display(), remote));
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.current.borrow_mut() = Some(spinner);
    }

    fn file_finished(&self, result: &UploadResult) {
        if let Some(spinner) = self.current.borrow_mut().take() {
            spinner.finish_and_clear();
        }

        if result.success {
            let size = format_bytes(result.size.unwrap_or(0));
            let etag = match &result.etag {
                Some(etag) => format!(" etag {etag}").dark_grey().to_string(),
                None => String::new(),
            };
            println!(
                "{}{}",
                format!(
                    "✓ Uploaded: {} → {} ({})",
                    result.local_path.display(),
                    result.remote_path,
                    size
                )
                .green(),
                etag
            );
        } else {
            println!(
                "{}",
                format!(
                    "✗ Failed: {} - {}",
                    result.local_path.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                )
                .red()
            );
        }
    }

    fn manifest_written(&self, path: &Path) {
        print_manifest_written(path);
    }
}

/// Default mode: one progress bar across the whole batch.
#[derive(Debug)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} files | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█░ "),
        );
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgress for BarProgress {
    fn directory_scanned(&self, dir: &Path, count: usize) {
        self.bar.println(format!(
            "{}",
            format!("Found {} file(s) to upload from {}", count, dir.display()).blue()
        ));
    }

    fn files_queued(&self, count: usize) {
        self.bar.inc_length(count as u64);
    }

    fn file_started(&self, local: &Path, _remote: &str) {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(truncate_filename(&name));
    }

    fn file_finished(&self, _result: &UploadResult) {
        self.bar.inc(1);
    }

    fn finished(&self) {
        self.bar.finish_with_message("done");
    }

    fn manifest_written(&self, path: &Path) {
        print_manifest_written(path);
    }
}

fn print_manifest_written(path: &Path) {
    println!(
        "{}",
        format!("\n✓ Upload mapping saved to: {}", path.display()).green()
    );
}
