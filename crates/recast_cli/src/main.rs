//! Recast CLI: bulk precompilation and verification of source trees.
//!
//! `recast compile` creates or resumes a compiler host, compiles every file
//! under the given source directories, and saves the host configuration.
//! `recast verify` rebuilds a read-only host from that configuration and
//! checks that every file is served from the cache.

#![warn(missing_docs)]

mod compile;
mod project;
mod verify;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Recast, a build-time transpilation cache.
#[derive(Parser, Debug)]
#[command(name = "recast", version, about = "Recast build-time transpilation cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `recast.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory (defaults to the directory holding `recast.toml`).
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Cache directory, overriding `cache.root` from the configuration.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile source directories into the cache and save the configuration.
    Compile(CompileArgs),
    /// Check that every file is served by a read-only host.
    Verify(VerifyArgs),
}

/// Arguments for the `recast compile` subcommand.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Source directories to compile.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Ignore any saved configuration and start from an empty fingerprint table.
    #[arg(long)]
    pub fresh: bool,
}

/// Arguments for the `recast verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Source directories to verify.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
    /// Optional explicit project directory.
    pub project: Option<PathBuf>,
    /// Optional cache directory override.
    pub cache_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        config: cli.config,
        project: cli.project,
        cache_dir: cli.cache_dir,
    };

    let result = match cli.command {
        Command::Compile(ref args) => compile::run(args, &global),
        Command::Verify(ref args) => verify::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the flags.
fn init_tracing(quiet: bool, verbose: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, true) => "debug",
        (false, false) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,recast_cli={level},recast_host={level},recast_cache={level}"
        ))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
