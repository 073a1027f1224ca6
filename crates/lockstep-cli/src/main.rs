//! lockstep CLI - lock requirements for a family of interdependent environments.

mod colors;
mod compile;
mod verify;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use lockstep_core::Options;

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(about = "Lock requirements for interdependent environments")]
#[command(version)]
#[command(disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: LockArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that lock files were regenerated after their sources changed
    #[command(disable_help_flag = true)]
    Verify,
}

/// Options shared by compilation and verification.
#[derive(Args)]
struct LockArgs {
    /// Pin packages matching GLOB with ~= instead of ==
    #[arg(short = 'c', long = "compatible", value_name = "GLOB", global = true)]
    compatible: Vec<String>,

    /// Fail if ENV pins a post-release version
    #[arg(short = 'p', long = "forbid-post", value_name = "ENV", global = true)]
    forbid_post: Vec<String>,

    /// Add package hashes to ENV and every environment it is connected to
    #[arg(short = 'g', long = "generate-hashes", value_name = "ENV", global = true)]
    generate_hashes: Vec<String>,

    /// Directory holding the requirements files
    #[arg(
        short = 'd',
        long = "directory",
        value_name = "DIR",
        default_value = "requirements",
        global = true,
    )]
    directory: PathBuf,

    /// File with the header for generated lock files
    #[arg(short = 'h', long = "header", value_name = "FILE", global = true)]
    header: Option<PathBuf>,

    /// Only process ENV and the environments it references
    #[arg(short = 'n', long = "only-name", value_name = "ENV", global = true)]
    only_name: Vec<String>,

    /// Upgrade every package (default)
    #[arg(long, overrides_with = "no_upgrade", global = true)]
    upgrade: bool,

    /// Keep existing pins where possible
    #[arg(long = "no-upgrade", overrides_with = "upgrade", global = true)]
    no_upgrade: bool,

    /// Upgrade only PKG (disables blanket upgrade)
    #[arg(short = 'P', long = "upgrade-package", value_name = "PKG", global = true)]
    upgrade_package: Vec<String>,

    /// Reuse the compiler's cache instead of rebuilding
    #[arg(short = 'u', long = "use-cache", global = true)]
    use_cache: bool,

    /// Pin packages considered unsafe in requirements files
    #[arg(long = "allow-unsafe", global = true)]
    allow_unsafe: bool,

    /// Extension of source requirements files
    #[arg(short = 'i', long = "in-ext", value_name = "EXT", default_value = "in", global = true)]
    in_ext: String,

    /// Extension of generated lock files
    #[arg(short = 'o', long = "out-ext", value_name = "EXT", default_value = "txt", global = true)]
    out_ext: String,

    /// Environments compiled concurrently (0 = one per CPU)
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = 0, global = true)]
    jobs: usize,

    /// Compiler program
    #[arg(long = "compiler", value_name = "PROGRAM", default_value = "pip-compile", global = true)]
    compiler: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help, global = true)]
    help: Option<bool>,
}

impl LockArgs {
    fn to_options(&self) -> Options {
        Options {
            base_dir: self.directory.clone(),
            in_ext: self.in_ext.clone(),
            out_ext: self.out_ext.clone(),
            header_file: self.header.clone(),
            include_names: self.only_name.clone(),
            upgrade: self.upgrade || !self.no_upgrade,
            upgrade_packages: self.upgrade_package.clone(),
            compatible_patterns: self.compatible.clone(),
            forbid_post: self.forbid_post.iter().cloned().collect(),
            add_hashes: self.generate_hashes.iter().cloned().collect(),
            use_cache: self.use_cache,
            allow_unsafe: self.allow_unsafe,
            jobs: self.jobs,
            compiler: self.compiler.clone(),
        }
        .normalized()
    }
}

/// Exit code for configuration errors (bad options, unknown or cyclic references).
const EXIT_CONFIGURATION: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.args.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let options = cli.args.to_options();
    let result = match cli.command {
        None => compile::execute(&options, cli.args.verbose),
        Some(Commands::Verify) => verify::execute(&options),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => report_error(&err),
    }
}

/// Print an error with recovery hints and pick the exit code.
fn report_error(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<lockstep_core::Error>() {
        Some(core_err) => {
            eprintln!(
                "{}Error:{} {}",
                colors::RED,
                colors::RESET,
                core_err.with_hint()
            );
            if core_err.is_configuration() {
                ExitCode::from(EXIT_CONFIGURATION)
            } else {
                ExitCode::FAILURE
            }
        }
        None => {
            eprintln!("{}Error:{} {:#}", colors::RED, colors::RESET, err);
            ExitCode::FAILURE
        }
    }
}
