//! Command definitions and dispatch.
//!
//! Each subcommand loads the configuration, builds an [`OssClient`] and prints
//! its own human-readable output. [`run`] returns the process exit code.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::style::Stylize;

use crate::api::OssClient;
use crate::config::{create_sample_config, ConfigLoader, ConfigSource, LoadedConfig, SampleKind};
use crate::format::format_bytes;
use crate::progress::{BarProgress, SpinnerProgress, UploadProgress};
use crate::store::{list_all, ListQuery, ObjectStore};
use crate::ui::{browse, TerminalPrompter};
use crate::uploader::{UploadOptions, UploadResult, Uploader};

#[derive(Debug, Parser)]
#[command(
    name = "oss-uploader",
    version,
    about = "A CLI tool for uploading files to Aliyun OSS"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files or directories to OSS
    Upload(UploadArgs),
    /// List files in an OSS bucket
    List(ListArgs),
    /// Delete a file from OSS
    Delete(DeleteArgs),
    /// Create a sample configuration file
    Init(InitArgs),
    /// Show bucket information and check the connection
    Info(ConfigArgs),
    /// Interactively browse directories in the bucket
    Browse(BrowseArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Path to a config file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Files or directories to upload
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Target directory in the bucket
    #[arg(short = 't', long, default_value = "", value_name = "PREFIX")]
    pub target: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Upload directories recursively (default)
    #[arg(short = 'r', long, overrides_with = "no_recursive")]
    pub recursive: bool,

    #[arg(long = "no-recursive", overrides_with = "recursive")]
    pub no_recursive: bool,

    /// Overwrite existing objects (default)
    #[arg(short = 'o', long, overrides_with = "no_overwrite")]
    pub overwrite: bool,

    /// Skip files whose key already exists
    #[arg(long = "no-overwrite", overrides_with = "overwrite")]
    pub no_overwrite: bool,

    /// Include glob patterns, relative to a directory source
    #[arg(short = 'i', long, num_args = 1.., value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Exclude glob patterns, relative to a directory source
    #[arg(short = 'e', long, num_args = 1.., value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Print one line per uploaded file
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Write the upload mapping to PATH instead of the default file
    #[arg(
        short = 'm',
        long = "mapping",
        num_args = 0..=1,
        default_missing_value = "",
        value_name = "PATH"
    )]
    pub mapping: Option<String>,

    /// Do not write an upload mapping file
    #[arg(long = "no-mapping")]
    pub no_mapping: bool,

    /// Insert a content hash into file names (default)
    #[arg(long, overrides_with = "no_hash")]
    pub hash: bool,

    #[arg(long = "no-hash", overrides_with = "hash")]
    pub no_hash: bool,

    /// Pick the target directory interactively
    #[arg(short = 'b', long)]
    pub browse: bool,
}

impl UploadArgs {
    pub fn options(&self) -> UploadOptions {
        UploadOptions {
            target: self.target.clone(),
            recursive: !self.no_recursive,
            overwrite: !self.no_overwrite,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            verbose: self.verbose,
            generate_mapping: !self.no_mapping,
            mapping_file: self
                .mapping
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            content_hash: !self.no_hash,
        }
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Prefix to list under
    #[arg(default_value = "")]
    pub prefix: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Maximum number of keys to return
    #[arg(short = 'm', long = "max-keys", default_value_t = 1000)]
    pub max_keys: u32,

    /// Show only directories
    #[arg(short = 'd', long = "dirs-only")]
    pub dirs_only: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Object key to delete
    pub path: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Where to write the sample config
    #[arg(short = 'o', long, default_value = ".ossrc.json", value_name = "PATH")]
    pub output: PathBuf,

    /// File format; inferred from the extension when omitted
    #[arg(short = 't', long = "type", value_enum)]
    pub kind: Option<SampleKind>,
}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Prefix to start from
    #[arg(default_value = "")]
    pub prefix: String,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute a parsed command line. Returns the exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let loader = ConfigLoader::from_process().context("Failed to read the working directory")?;

    match cli.command {
        Command::Upload(args) => upload(&loader, &args),
        Command::List(args) => list(&loader, &args),
        Command::Delete(args) => delete(&loader, &args),
        Command::Init(args) => init(&loader, &args),
        Command::Info(args) => info(&loader, &args),
        Command::Browse(args) => browse_bucket(&loader, &args),
    }
}

fn load_config(loader: &ConfigLoader, args: &ConfigArgs) -> Result<LoadedConfig> {
    let loaded = loader.load(args.config.as_deref())?;
    for warning in &loaded.warnings {
        println!("{}", format!("⚠ Warning: {warning}").yellow());
    }
    if loaded.source == ConfigSource::Environment {
        println!("{}", "ℹ Using configuration from environment variables".cyan());
    }
    Ok(loaded)
}

fn connect(loader: &ConfigLoader, args: &ConfigArgs) -> Result<OssClient> {
    let loaded = load_config(loader, args)?;
    OssClient::new(loaded.config).context("Failed to create OSS client")
}

fn upload(loader: &ConfigLoader, args: &UploadArgs) -> Result<i32> {
    println!("{}", "🚀 Starting upload process...\n".blue());

    let loaded = load_config(loader, &args.config)?;
    if args.verbose {
        println!(
            "{}",
            format!(
                "Config loaded: Region={}, Bucket={}\n",
                loaded.config.region, loaded.config.bucket
            )
            .dark_grey()
        );
    }
    let config = loaded.config.clone();
    let client = OssClient::new(loaded.config).context("Failed to create OSS client")?;

    let mut options = args.options();
    if args.browse {
        let mut stdout = io::stdout();
        match browse(&client, &mut TerminalPrompter, &mut stdout, &options.target)? {
            Some(prefix) => {
                println!("{}", format!("\nUploading to: /{prefix}\n").green());
                options.target = prefix;
            }
            None => {
                println!("{}", "No target selected, upload cancelled.".yellow());
                return Ok(0);
            }
        }
    }

    let progress: Box<dyn UploadProgress> = if options.verbose {
        Box::new(SpinnerProgress::new())
    } else {
        Box::new(BarProgress::new())
    };
    let uploader = Uploader::new(client, &config, loader.cwd()).with_progress(progress);

    let sources: Vec<PathBuf> = args.sources.iter().map(|s| loader.cwd().join(s)).collect();
    let results = match sources.as_slice() {
        [single] => uploader.upload(single, &options)?,
        many => uploader.upload_multiple(many, &options)?,
    };

    let summary = Summary::of(&results);
    print_summary(&summary, &results);
    Ok(if summary.failed > 0 { 1 } else { 0 })
}

/// Counts printed after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    pub total_size: u64,
}

impl Summary {
    pub fn of(results: &[UploadResult]) -> Self {
        let succeeded: Vec<&UploadResult> = results.iter().filter(|r| r.success).collect();
        Self {
            succeeded: succeeded.len(),
            failed: results.len() - succeeded.len(),
            total_size: succeeded.iter().filter_map(|r| r.size).sum(),
        }
    }
}

fn print_summary(summary: &Summary, results: &[UploadResult]) {
    println!("{}", "\n📊 Upload Summary:".bold());
    println!("{}", format!("  ✓ Successful: {}", summary.succeeded).green());
    if summary.failed > 0 {
        println!("{}", format!("  ✗ Failed: {}", summary.failed).red());
    }
    println!(
        "{}",
        format!("  📦 Total size: {}", format_bytes(summary.total_size)).blue()
    );

    if summary.failed > 0 {
        println!("{}", "\nFailed files:".red());
        for result in results.iter().filter(|r| !r.success) {
            println!(
                "{}",
                format!(
                    "  - {}: {}",
                    result.local_path.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                )
                .red()
            );
        }
    } else {
        println!("{}", "\n✨ All files uploaded successfully!".green());
    }
}

fn list(loader: &ConfigLoader, args: &ListArgs) -> Result<i32> {
    let client = connect(loader, &args.config)?;
    let display_prefix = if args.prefix.is_empty() { "/" } else { &args.prefix };
    println!("{}", format!("📋 Listing files in: {display_prefix}\n").blue());

    let mut query = ListQuery::prefix(args.prefix.as_str()).max_keys(args.max_keys);
    if args.dirs_only {
        query = query.directories();
        let page = list_all(&client, &query).context("Failed to list files")?;
        if page.prefixes.is_empty() {
            println!("{}", "No directories found.".yellow());
            return Ok(0);
        }
        println!("{}", format!("Found {} director(ies):", page.prefixes.len()).green());
        for prefix in &page.prefixes {
            println!("  📁 {prefix}");
        }
        return Ok(0);
    }

    let page = client.list(&query).context("Failed to list files")?;
    if page.objects.is_empty() {
        println!("{}", "No files found.".yellow());
        return Ok(0);
    }
    println!("{}", format!("Found {} file(s):", page.objects.len()).green());
    for object in &page.objects {
        println!(
            "  {} {}",
            object.key,
            format!("({})", format_bytes(object.size)).dark_grey()
        );
    }
    if page.is_truncated {
        println!(
            "{}",
            "\n(more results available; raise --max-keys or narrow the prefix)".dark_grey()
        );
    }
    Ok(0)
}

fn delete(loader: &ConfigLoader, args: &DeleteArgs) -> Result<i32> {
    let client = connect(loader, &args.config)?;
    println!("{}", format!("⚠️  Deleting file: {}", args.path).yellow());
    client
        .delete(&args.path)
        .with_context(|| format!("Failed to delete {}", args.path))?;
    println!("{}", format!("✓ Deleted: {}", args.path).green());
    println!("{}", "\n✨ File deleted successfully!".green());
    Ok(0)
}

fn init(loader: &ConfigLoader, args: &InitArgs) -> Result<i32> {
    let path = loader.cwd().join(&args.output);
    let kind = create_sample_config(&path, args.kind)?;
    print_init_hints(&path, kind);
    Ok(0)
}

fn print_init_hints(path: &Path, kind: SampleKind) {
    println!(
        "{}",
        format!("✓ Sample config file created: {}", path.display()).green()
    );
    println!(
        "{}",
        "\nPlease edit the file and add your OSS credentials.".yellow()
    );
    if kind == SampleKind::Toml {
        println!(
            "{}",
            "Values like ${OSS_ACCESS_KEY_ID} are read from the environment at load time."
                .dark_grey()
        );
    }
    println!(
        "{}",
        "\n💡 Tip: Add the config file to .gitignore to keep credentials secure.".cyan()
    );
}

fn info(loader: &ConfigLoader, args: &ConfigArgs) -> Result<i32> {
    let loaded = load_config(loader, args)?;
    let region = loaded.config.region.clone();
    let client = OssClient::new(loaded.config).context("Failed to create OSS client")?;

    println!("{}", "📦 Bucket Information:\n".blue());
    let info = client
        .bucket_info()
        .context("Failed to get bucket info")?;
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("  Bucket: {}", info.name.clone().cyan());
    println!("  Region: {}", region.cyan());
    println!("  Location: {}", or_dash(&info.location));
    println!("  Created: {}", or_dash(&info.creation_date));
    println!("  Storage class: {}", or_dash(&info.storage_class));
    println!("  Extranet endpoint: {}", or_dash(&info.extranet_endpoint));
    println!("  Intranet endpoint: {}", or_dash(&info.intranet_endpoint));
    println!("  ACL: {}", or_dash(&info.acl));
    println!("{}", "\n✨ Connection successful!".green());
    Ok(0)
}

fn browse_bucket(loader: &ConfigLoader, args: &BrowseArgs) -> Result<i32> {
    let client = connect(loader, &args.config)?;
    let mut stdout = io::stdout();

    match browse(&client, &mut TerminalPrompter, &mut stdout, &args.prefix)? {
        Some(prefix) => {
            println!("{}", format!("\n✓ Selected: /{prefix}").green());
            println!(
                "{}",
                format!("Upload here with: oss-uploader upload <source> -t {prefix}").dark_grey()
            );
        }
        None => println!("{}", "No directory selected.".yellow()),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("oss-uploader").chain(args.iter().copied())).unwrap()
    }

    fn upload_args(args: &[&str]) -> UploadArgs {
        let mut full = vec!["upload"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Command::Upload(args) => args,
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn test_upload_defaults() {
        let args = upload_args(&["dist"]);
        assert_eq!(args.sources, vec![PathBuf::from("dist")]);
        assert_eq!(args.options(), UploadOptions::default());
    }

    #[test]
    fn test_upload_negated_flags() {
        let options = upload_args(&[
            "dist",
            "--no-recursive",
            "--no-overwrite",
            "--no-hash",
            "--no-mapping",
            "-t",
            "static",
        ])
        .options();
        assert!(!options.recursive);
        assert!(!options.overwrite);
        assert!(!options.content_hash);
        assert!(!options.generate_mapping);
        assert_eq!(options.target, "static");
    }

    #[test]
    fn test_last_of_a_flag_pair_wins() {
        let options = upload_args(&["a.js", "--no-overwrite", "--overwrite"]).options();
        assert!(options.overwrite);
        let options = upload_args(&["a.js", "--hash", "--no-hash"]).options();
        assert!(!options.content_hash);
    }

    #[test]
    fn test_mapping_path_is_optional() {
        let options = upload_args(&["a.js", "-m"]).options();
        assert!(options.generate_mapping);
        assert_eq!(options.mapping_file, None);

        let options = upload_args(&["a.js", "--mapping", "out/map.json"]).options();
        assert_eq!(options.mapping_file, Some(PathBuf::from("out/map.json")));
    }

    #[test]
    fn test_include_takes_several_patterns() {
        let options =
            upload_args(&["dist", "-i", "**/*.js", "**/*.css", "-e", "**/*.map"]).options();
        assert_eq!(options.include, vec!["**/*.js", "**/*.css"]);
        assert_eq!(options.exclude, vec!["**/*.map"]);
    }

    #[test]
    fn test_upload_requires_a_source() {
        assert!(Cli::try_parse_from(["oss-uploader", "upload"]).is_err());
    }

    #[test]
    fn test_list_and_init_flags() {
        match parse(&["list", "static/", "-m", "50", "-d"]).command {
            Command::List(args) => {
                assert_eq!(args.prefix, "static/");
                assert_eq!(args.max_keys, 50);
                assert!(args.dirs_only);
            }
            other => panic!("expected list, got {other:?}"),
        }

        match parse(&["init", "-t", "toml", "-o", "oss.config.toml"]).command {
            Command::Init(args) => {
                assert_eq!(args.kind, Some(SampleKind::Toml));
                assert_eq!(args.output, PathBuf::from("oss.config.toml"));
            }
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            UploadResult::succeeded("a.js".into(), "a.js".into(), "u".into(), Some(1024)),
            UploadResult::failed("b.js".into(), "b.js".into(), "boom".into()),
            UploadResult::succeeded("c.js".into(), "c.js".into(), "u".into(), None),
        ];
        assert_eq!(
            Summary::of(&results),
            Summary {
                succeeded: 2,
                failed: 1,
                total_size: 1024
            }
        );
    }
}
