// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, hand off to `cli::run`.
// - Errors bubble up as `anyhow::Error` and are printed once here.

use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use oss_uploader::cli::{self, Cli};

fn init_tracing() {
    // Logs go to stderr so they never mix with command output on stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let args = Cli::parse();

    let code = match cli::run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", format!("\n❌ Error: {err:#}").red());
            1
        }
    };
    std::process::exit(code);
}
