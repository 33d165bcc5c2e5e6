// Library root
// -----------
// The binary (`main.rs`) only parses arguments and reports errors; every
// command lives behind these modules so it can be driven from tests.
//
// Module responsibilities:
// - `config`: locate, interpolate and validate bucket credentials.
// - `store` / `api` / `signer`: the object-store seam and its OSS REST
//   implementation with header signing.
// - `uploader` / `manifest` / `progress`: batch uploads, the JSON mapping
//   file and terminal progress output.
// - `ui`: the interactive prefix browser.
// - `cli`: clap command definitions and dispatch.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod manifest;
pub mod progress;
pub mod signer;
pub mod store;
pub mod ui;
pub mod uploader;

pub use api::OssClient;
pub use config::{ConfigLoader, ConfigSource, LoadedConfig, OssConfig};
pub use error::{ConfigError, OssError, UploadError};
pub use store::{HeadOutcome, ListPage, ListQuery, ObjectMeta, ObjectStore};
pub use uploader::{UploadOptions, UploadResult, Uploader};
