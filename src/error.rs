// Error types shared by the library modules. The binary wraps these in
// `anyhow::Error` so every failure can be printed with its context chain.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while locating, parsing or validating the OSS configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(
        "No configuration found. Please create a .ossrc.json, specify config path, or set \
         environment variables (OSS_REGION, OSS_ACCESS_KEY_ID, OSS_ACCESS_KEY_SECRET, OSS_BUCKET)."
    )]
    NoConfiguration,

    #[error("Unsupported config file format: {ext} ({})", path.display())]
    UnsupportedFormat { path: PathBuf, ext: String },

    #[error("Failed to load config from {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Missing required configuration fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Config file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the object-storage service.
#[derive(Debug, Error)]
pub enum OssError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response carrying an OSS `<Error>` document.
    #[error("{code}: {message} (status {status}, request id {request_id})")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// Non-2xx response without a parsable error body (e.g. HEAD).
    #[error("unexpected response status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Xml(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signing key")]
    Signing,
}

/// Failures that abort a single-source upload or the manifest step.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Source path does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Source is a directory. Use --recursive flag to upload directories.")]
    IsDirectory(PathBuf),

    #[error("Invalid source: {}", .0.display())]
    InvalidSource(PathBuf),

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("failed to write manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    ManifestEncode(#[from] serde_json::Error),
}
