//! Configuration loading for the OSS client.
//!
//! Sources, in priority order:
//!
//! 1. An explicit file passed with `--config` (`.json`, `.yaml`/`.yml`,
//!    `.toml`, or extensionless JSON/YAML).
//! 2. The first file found walking up from the working directory to the
//!    home directory, out of [`SEARCH_PLACES`]. `package.json` only counts
//!    when it carries an `"oss"` field.
//! 3. `OSS_*` environment variables, consulted only when no file is found.
//!
//! String values in config files may reference the environment with
//! `${NAME}` or `${NAME:-fallback}`:
//!
//! ```toml
//! region = "${OSS_REGION:-oss-cn-hangzhou}"
//! accessKeyId = "${OSS_ACCESS_KEY_ID}"
//! accessKeySecret = "${OSS_ACCESS_KEY_SECRET}"
//! bucket = "static-assets"
//! secure = true
//! timeout = 60000
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;

/// Key looked up in `package.json`.
pub const PACKAGE_JSON_KEY: &str = "oss";

/// File names tried in every directory during discovery, in order.
pub const SEARCH_PLACES: [&str; 8] = [
    ".ossrc",
    ".ossrc.json",
    ".ossrc.yaml",
    ".ossrc.yml",
    ".ossrc.toml",
    "oss.config.json",
    "oss.config.toml",
    "package.json",
];

/// Request timeout used when the config does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Validated OSS connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OssConfig {
    pub region: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub internal: bool,
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_secure() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl OssConfig {
    /// Build a config with the required fields and defaults for the rest.
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            bucket: bucket.into(),
            endpoint: None,
            internal: false,
            secure: true,
            timeout: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

// Keep the secret out of logs and panic messages.
impl fmt::Debug for OssConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OssConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("internal", &self.internal)
            .field("secure", &self.secure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
}

/// Result of [`ConfigLoader::load`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: OssConfig,
    pub source: ConfigSource,
    /// Non-fatal problems worth showing to the user.
    pub warnings: Vec<String>,
}

/// Unvalidated settings as they appear in a file or the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    access_key_secret: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    internal: Option<bool>,
    #[serde(default, deserialize_with = "flexible_bool")]
    secure: Option<bool>,
    #[serde(default, deserialize_with = "flexible_u64")]
    timeout: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flexible<T> {
    Value(T),
    Text(String),
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match Option::<Flexible<bool>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flexible::Value(value)) => Ok(Some(value)),
        Some(Flexible::Text(text)) => match text.trim() {
            "" => Ok(None),
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("expected a boolean, found \"{other}\""))),
        },
    }
}

fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<Flexible<u64>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flexible::Value(value)) => Ok(Some(value)),
        Some(Flexible::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Flexible::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found \"{text}\""))),
    }
}

/// Resolves configuration against an explicit working directory, home
/// directory and environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cwd: PathBuf,
    home: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ConfigLoader {
    /// Loader rooted at `cwd` with no home directory and an empty environment.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            home: None,
            env: HashMap::new(),
        }
    }

    /// Loader bound to the current process: its working directory, the
    /// user's home directory and the process environment.
    pub fn from_process() -> std::io::Result<Self> {
        Ok(Self {
            cwd: std::env::current_dir()?,
            home: dirs::home_dir(),
            env: std::env::vars().collect(),
        })
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    /// Fails when no source is found, a file cannot be parsed, or required
    /// fields are missing.
    pub fn load(&self, explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let (raw, source) = match explicit {
            Some(path) => {
                let path = self.cwd.join(path);
                if !path.exists() {
                    return Err(ConfigError::NotFound(path));
                }
                let value = self.read_explicit(&path)?;
                (self.to_raw(&path, value)?, ConfigSource::File(path))
            }
            None => match self.discover()? {
                Some((path, value)) => (self.to_raw(&path, value)?, ConfigSource::File(path)),
                None => match self.from_env() {
                    Some(raw) => (raw, ConfigSource::Environment),
                    None => return Err(ConfigError::NoConfiguration),
                },
            },
        };

        debug!(?source, "configuration resolved");
        let (config, warnings) = validate(raw)?;
        Ok(LoadedConfig {
            config,
            source,
            warnings,
        })
    }

    fn read_explicit(&self, path: &Path) -> Result<Value, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "" => parse_json_or_yaml(path),
            "json" => parse_json(path),
            "yaml" | "yml" => parse_yaml(path),
            "toml" => parse_toml(path),
            other => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
                ext: format!(".{other}"),
            }),
        }
    }

    fn discover(&self) -> Result<Option<(PathBuf, Value)>, ConfigError> {
        for dir in self.cwd.ancestors() {
            for place in SEARCH_PLACES {
                let candidate = dir.join(place);
                if !candidate.is_file() {
                    continue;
                }
                let value = match place {
                    "package.json" => match parse_json(&candidate)?.get(PACKAGE_JSON_KEY) {
                        Some(section) => section.clone(),
                        None => continue,
                    },
                    ".ossrc" => parse_json_or_yaml(&candidate)?,
                    p if p.ends_with(".toml") => parse_toml(&candidate)?,
                    p if p.ends_with(".yaml") || p.ends_with(".yml") => parse_yaml(&candidate)?,
                    _ => parse_json(&candidate)?,
                };
                debug!(path = %candidate.display(), "found config file");
                return Ok(Some((candidate, value)));
            }
            if self.home.as_deref() == Some(dir) {
                break;
            }
        }
        Ok(None)
    }

    fn to_raw(&self, path: &Path, mut value: Value) -> Result<RawConfig, ConfigError> {
        interpolate(&mut value, &self.env);
        serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn from_env(&self) -> Option<RawConfig> {
        let var = |name: &str| self.env.get(name).cloned();

        let required = ["OSS_REGION", "OSS_ACCESS_KEY_ID", "OSS_ACCESS_KEY_SECRET", "OSS_BUCKET"];
        if required.iter().all(|name| var(name).map_or(true, |v| v.is_empty())) {
            return None;
        }

        Some(RawConfig {
            region: var("OSS_REGION"),
            access_key_id: var("OSS_ACCESS_KEY_ID"),
            access_key_secret: var("OSS_ACCESS_KEY_SECRET"),
            bucket: var("OSS_BUCKET"),
            endpoint: var("OSS_ENDPOINT"),
            internal: var("OSS_INTERNAL").map(|v| v == "true"),
            secure: var("OSS_SECURE").map(|v| v == "true"),
            timeout: var("OSS_TIMEOUT").and_then(|v| v.trim().parse().ok()),
        })
    }
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json(path: &Path) -> Result<Value, ConfigError> {
    let text = read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_yaml(path: &Path) -> Result<Value, ConfigError> {
    let text = read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Extensionless files hold JSON or YAML.
fn parse_json_or_yaml(path: &Path) -> Result<Value, ConfigError> {
    parse_json(path).or_else(|_| parse_yaml(path))
}

fn parse_toml(path: &Path) -> Result<Value, ConfigError> {
    let text = read_to_string(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Expand `${NAME}` / `${NAME:-fallback}` in every string of `value`.
fn interpolate(value: &mut Value, env: &HashMap<String, String>) {
    match value {
        Value::String(text) => {
            if text.contains("${") {
                *text = expand_vars(text, env);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| interpolate(item, env)),
        Value::Object(map) => map.values_mut().for_each(|item| interpolate(item, env)),
        _ => {}
    }
}

/// Expand environment references in a single string. Unset or empty
/// variables without a fallback expand to nothing; an unterminated `${` is
/// kept verbatim.
pub fn expand_vars(input: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };
        match env.get(name.trim()).filter(|v| !v.is_empty()) {
            Some(value) => out.push_str(value),
            None => out.push_str(fallback.unwrap_or_default()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn validate(raw: RawConfig) -> Result<(OssConfig, Vec<String>), ConfigError> {
    fn present(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    let region = present(raw.region);
    let access_key_id = present(raw.access_key_id);
    let access_key_secret = present(raw.access_key_secret);
    let bucket = present(raw.bucket);

    let mut missing = Vec::new();
    if region.is_none() {
        missing.push("region");
    }
    if access_key_id.is_none() {
        missing.push("accessKeyId");
    }
    if access_key_secret.is_none() {
        missing.push("accessKeySecret");
    }
    if bucket.is_none() {
        missing.push("bucket");
    }

    let (Some(region), Some(access_key_id), Some(access_key_secret), Some(bucket)) =
        (region, access_key_id, access_key_secret, bucket)
    else {
        return Err(ConfigError::MissingFields(missing));
    };

    let mut warnings = Vec::new();
    if !region.starts_with("oss-") {
        warnings.push(format!(
            "Region \"{region}\" doesn't follow the standard format (e.g., \"oss-cn-hangzhou\")"
        ));
    }

    let config = OssConfig {
        region,
        access_key_id,
        access_key_secret,
        bucket,
        endpoint: present(raw.endpoint),
        internal: raw.internal.unwrap_or(false),
        secure: raw.secure.unwrap_or(true),
        // Zero means unset.
        timeout: raw.timeout.filter(|t| *t > 0).unwrap_or(DEFAULT_TIMEOUT_MS),
    };
    Ok((config, warnings))
}

/// Format of a generated sample config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SampleKind {
    Json,
    Toml,
}

impl SampleKind {
    /// Pick the format from a file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SampleKind::Toml,
            _ => SampleKind::Json,
        }
    }
}

const TOML_SAMPLE: &str = r#"# OSS Uploader configuration
# String values may reference environment variables: ${NAME} or ${NAME:-fallback}

# Required fields
region = "${OSS_REGION:-oss-cn-hangzhou}"
accessKeyId = "${OSS_ACCESS_KEY_ID:-YOUR_ACCESS_KEY_ID}"
accessKeySecret = "${OSS_ACCESS_KEY_SECRET:-YOUR_ACCESS_KEY_SECRET}"
bucket = "${OSS_BUCKET:-YOUR_BUCKET_NAME}"

# Optional fields
# endpoint = "${OSS_ENDPOINT}"
# internal = "${OSS_INTERNAL:-false}"
secure = true
timeout = 60000
"#;

/// Write a sample configuration file to `path`.
///
/// # Errors
/// Fails with [`ConfigError::AlreadyExists`] if the file is already there.
pub fn create_sample_config(
    path: &Path,
    kind: Option<SampleKind>,
) -> Result<SampleKind, ConfigError> {
    let kind = kind.unwrap_or_else(|| SampleKind::from_path(path));
    let content = match kind {
        SampleKind::Toml => TOML_SAMPLE.to_string(),
        SampleKind::Json => {
            let sample = OssConfig::new(
                "oss-cn-hangzhou",
                "YOUR_ACCESS_KEY_ID",
                "YOUR_ACCESS_KEY_SECRET",
                "YOUR_BUCKET_NAME",
            );
            let mut json = serde_json::to_string_pretty(&sample).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            json.push('\n');
            json
        }
    };

    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(io_err(e)),
    };
    file.write_all(content.as_bytes()).map_err(io_err)?;
    Ok(kind)
}
