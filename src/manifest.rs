//! JSON manifest of a finished upload batch.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::UploadError;
use crate::format::format_bytes;
use crate::uploader::UploadResult;

/// Written to the working directory when no manifest path is given.
pub const DEFAULT_MAPPING_FILE: &str = ".oss-uploader-mapping.json";

/// One uploaded file in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMapping {
    pub local_path: String,
    pub remote_path: String,
    pub url: String,
    pub size: u64,
    pub size_formatted: String,
    pub upload_time: String,
    pub upload_time_local: String,
}

/// The manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadManifest {
    pub upload_time: String,
    pub upload_time_local: String,
    pub bucket: String,
    pub region: String,
    pub total_files: usize,
    pub total_size: u64,
    pub total_size_formatted: String,
    pub files: Vec<UploadMapping>,
}

fn iso_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S").to_string()
}

/// Writes manifests for one bucket.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    bucket: String,
    region: String,
    working_dir: PathBuf,
}

impl ManifestWriter {
    /// `working_dir` anchors the default file name and relative paths.
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Build the manifest for the successful results, or `None` when there
    /// are none.
    pub fn build(&self, results: &[UploadResult], now: DateTime<Utc>) -> Option<UploadManifest> {
        let files: Vec<UploadMapping> = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| {
                let url = r.url.clone()?;
                let size = r.size.unwrap_or(0);
                let at = r.uploaded_at.unwrap_or(now);
                Some(UploadMapping {
                    local_path: r.local_path.display().to_string(),
                    remote_path: r.remote_path.clone(),
                    url,
                    size,
                    size_formatted: format_bytes(size),
                    upload_time: iso_time(at),
                    upload_time_local: local_time(at),
                })
            })
            .collect();

        if files.is_empty() {
            return None;
        }

        let total_size = files.iter().map(|f| f.size).sum();
        Some(UploadManifest {
            upload_time: iso_time(now),
            upload_time_local: local_time(now),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            total_files: files.len(),
            total_size,
            total_size_formatted: format_bytes(total_size),
            files,
        })
    }

    /// Write the manifest to `path` (default: [`DEFAULT_MAPPING_FILE`] in the
    /// working directory), replacing any existing file.
    ///
    /// Returns the written path, or `None` when no upload succeeded.
    pub fn generate_mapping_file(
        &self,
        results: &[UploadResult],
        path: Option<&Path>,
    ) -> Result<Option<PathBuf>, UploadError> {
        let Some(manifest) = self.build(results, Utc::now()) else {
            return Ok(None);
        };

        let path = match path {
            Some(path) => self.working_dir.join(path),
            None => self.working_dir.join(DEFAULT_MAPPING_FILE),
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&path, json).map_err(|source| UploadError::Manifest {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), files = manifest.total_files, "wrote upload manifest");
        Ok(Some(path))
    }
}
