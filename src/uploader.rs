//! Batch upload orchestration.
//!
//! Sources are processed strictly in order, one request at a time. Failures
//! of individual files are captured in their [`UploadResult`] and never stop
//! the batch.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::OssConfig;
use crate::error::UploadError;
use crate::format::{join_remote, normalize_path};
use crate::hash::{add_hash_to_filename, hash_file};
use crate::manifest::ManifestWriter;
use crate::progress::{NoProgress, UploadProgress};
use crate::store::{HeadOutcome, ObjectStore};

/// Include pattern used when none is given.
pub const DEFAULT_INCLUDE: &str = "**/*";

/// Error recorded when overwrite is disabled and the key is taken.
pub const ALREADY_EXISTS: &str = "File already exists (use --overwrite to replace)";

/// Error recorded for a missing source in a multi-source batch.
pub const SOURCE_MISSING: &str = "Source path does not exist";

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub local_path: PathBuf,
    /// Object key, always `/`-separated.
    pub remote_path: String,
    pub url: Option<String>,
    pub size: Option<u64>,
    pub error: Option<String>,
    /// ETag the service returned for the stored object.
    pub etag: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl UploadResult {
    pub fn succeeded(
        local_path: PathBuf,
        remote_path: String,
        url: String,
        size: Option<u64>,
    ) -> Self {
        Self {
            success: true,
            local_path,
            remote_path,
            url: Some(url),
            size,
            error: None,
            etag: None,
            uploaded_at: None,
        }
    }

    pub fn failed(local_path: PathBuf, remote_path: String, error: String) -> Self {
        Self {
            success: false,
            local_path,
            remote_path,
            url: None,
            size: None,
            error: Some(error),
            etag: None,
            uploaded_at: None,
        }
    }

    pub fn with_upload_time(mut self, at: DateTime<Utc>) -> Self {
        self.uploaded_at = Some(at);
        self
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }
}

/// Per-invocation upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Remote directory prefix; empty for the bucket root.
    pub target: String,
    pub recursive: bool,
    pub overwrite: bool,
    /// Glob patterns relative to a directory source; empty means
    /// [`DEFAULT_INCLUDE`].
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub verbose: bool,
    pub generate_mapping: bool,
    pub mapping_file: Option<PathBuf>,
    pub content_hash: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            target: String::new(),
            recursive: true,
            overwrite: true,
            include: Vec::new(),
            exclude: Vec::new(),
            verbose: false,
            generate_mapping: true,
            mapping_file: None,
            content_hash: true,
        }
    }
}

/// Uploads files and directories through an [`ObjectStore`].
pub struct Uploader<S> {
    store: S,
    manifest: ManifestWriter,
    progress: Box<dyn UploadProgress>,
}

impl<S: ObjectStore> Uploader<S> {
    /// `working_dir` is where the default manifest is written.
    pub fn new(store: S, config: &OssConfig, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            manifest: ManifestWriter::new(&config.bucket, &config.region, working_dir),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn UploadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Upload one file or directory.
    ///
    /// # Errors
    /// A missing source, a directory without `recursive`, an invalid glob
    /// pattern, or a failed manifest write. Per-file failures are results.
    pub fn upload(
        &self,
        source: &Path,
        options: &UploadOptions,
    ) -> Result<Vec<UploadResult>, UploadError> {
        let results = self.upload_source(source, options)?;
        self.finish(&results, options)?;
        Ok(results)
    }

    /// Upload several sources. Source-level problems become failed results
    /// so the remaining sources still run.
    ///
    /// # Errors
    /// Only a failed manifest write.
    pub fn upload_multiple(
        &self,
        sources: &[PathBuf],
        options: &UploadOptions,
    ) -> Result<Vec<UploadResult>, UploadError> {
        let mut results = Vec::new();

        for source in sources {
            match self.upload_source(source, options) {
                Ok(batch) => results.extend(batch),
                Err(err) => {
                    let message = match err {
                        UploadError::SourceNotFound(_) => SOURCE_MISSING.to_string(),
                        other => other.to_string(),
                    };
                    info!(source = %source.display(), error = %message, "skipping source");
                    let name = source
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    results.push(UploadResult::failed(
                        source.clone(),
                        join_remote(&options.target, &name),
                        message,
                    ));
                }
            }
        }

        self.finish(&results, options)?;
        Ok(results)
    }

    fn finish(&self, results: &[UploadResult], options: &UploadOptions) -> Result<(), UploadError> {
        self.progress.finished();
        if options.generate_mapping {
            if let Some(path) = self
                .manifest
                .generate_mapping_file(results, options.mapping_file.as_deref())?
            {
                self.progress.manifest_written(&path);
            }
        }
        Ok(())
    }

    fn upload_source(
        &self,
        source: &Path,
        options: &UploadOptions,
    ) -> Result<Vec<UploadResult>, UploadError> {
        let metadata =
            fs::metadata(source).map_err(|_| UploadError::SourceNotFound(source.to_path_buf()))?;

        if metadata.is_file() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| UploadError::InvalidSource(source.to_path_buf()))?;
            self.progress.files_queued(1);
            Ok(vec![self.upload_one(source, &name, options)])
        } else if metadata.is_dir() {
            if !options.recursive {
                return Err(UploadError::IsDirectory(source.to_path_buf()));
            }
            self.upload_directory(source, options)
        } else {
            Err(UploadError::InvalidSource(source.to_path_buf()))
        }
    }

    fn upload_directory(
        &self,
        dir: &Path,
        options: &UploadOptions,
    ) -> Result<Vec<UploadResult>, UploadError> {
        let include = if options.include.is_empty() {
            build_globset(&[DEFAULT_INCLUDE.to_string()])?
        } else {
            build_globset(&options.include)?
        };
        let exclude = build_globset(&options.exclude)?;

        let files = collect_files(dir, &include, &exclude);
        self.progress.directory_scanned(dir, files.len());
        self.progress.files_queued(files.len());

        Ok(files
            .iter()
            .map(|(path, relative)| self.upload_one(path, relative, options))
            .collect())
    }

    /// Upload `local` to `target/relative`, hashing the file name if enabled.
    fn upload_one(&self, local: &Path, relative: &str, options: &UploadOptions) -> UploadResult {
        let key = if options.content_hash {
            hash_file(local).map(|hash| hashed_key(&options.target, relative, &hash))
        } else {
            Ok(join_remote(&options.target, relative))
        };

        let result = match key {
            Ok(key) => {
                self.progress.file_started(local, &key);
                self.transfer(local, key, options.overwrite)
            }
            Err(err) => {
                let key = join_remote(&options.target, relative);
                self.progress.file_started(local, &key);
                UploadResult::failed(local.to_path_buf(), key, err.to_string())
            }
        };

        if result.success {
            info!(local = %local.display(), remote = %result.remote_path, "uploaded");
        } else {
            info!(
                local = %local.display(),
                remote = %result.remote_path,
                error = result.error.as_deref().unwrap_or_default(),
                "upload failed"
            );
        }
        self.progress.file_finished(&result);
        result
    }

    fn transfer(&self, local: &Path, key: String, overwrite: bool) -> UploadResult {
        if !overwrite {
            match self.store.head(&key) {
                Ok(HeadOutcome::Found(head)) => {
                    debug!(
                        key = %key,
                        size = ?head.size,
                        etag = ?head.etag,
                        last_modified = ?head.last_modified,
                        "object already exists"
                    );
                    let error = ALREADY_EXISTS.to_string();
                    return UploadResult::failed(local.to_path_buf(), key, error);
                }
                Ok(HeadOutcome::NotFound) => {}
                Err(err) => {
                    return UploadResult::failed(local.to_path_buf(), key, err.to_string());
                }
            }
        }

        let size = fs::metadata(local).map(|m| m.len()).ok();
        match self.store.put_file(&key, local) {
            Ok(outcome) => {
                let url = self.store.public_url(&key);
                UploadResult::succeeded(local.to_path_buf(), key, url, size)
                    .with_etag(outcome.etag)
                    .with_upload_time(Utc::now())
            }
            Err(err) => UploadResult::failed(local.to_path_buf(), key, err.to_string()),
        }
    }
}

/// Key for `relative` under `target` with the content hash in the file name.
fn hashed_key(target: &str, relative: &str, hash: &str) -> String {
    let relative = normalize_path(relative);
    let hashed = match relative.rsplit_once('/') {
        Some((dir, name)) => format!("{}/{}", dir, add_hash_to_filename(name, hash)),
        None => add_hash_to_filename(&relative, hash),
    };
    join_remote(target, &hashed)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, UploadError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

/// Files below `root` matching `include` and not `exclude`, as
/// `(path, relative)` pairs sorted by relative path. Excluded directories
/// are not descended into.
fn collect_files(root: &Path, include: &GlobSet, exclude: &GlobSet) -> Vec<(PathBuf, String)> {
    let relative_of = |path: &Path| -> Option<String> {
        let rel = path.strip_prefix(root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    };

    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || relative_of(entry.path()).map_or(true, |rel| !exclude.is_match(&rel))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_of(entry.path()) else {
            continue;
        };
        if include.is_match(&relative) && !exclude.is_match(&relative) {
            files.push((entry.into_path(), relative));
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}
