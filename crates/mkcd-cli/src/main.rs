mod cmd;
mod output;

use clap::{Args, Parser, Subcommand};
use cmd::{config::ConfigSubcommand, create::CreateArgs, profile::ProfileSubcommand};
use mkcd_core::paths;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mkcd",
    about = "Create a directory, set it up as a workspace, and cd into it",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(flatten)]
    create: CreateArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: ~/.config/mkcd/mkcd.conf)
    #[arg(short = 'c', long, global = true, env = paths::CONFIG_ENV, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Describe every action without performing it
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Show progress detail
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Only print warnings, errors and the cd line
    #[arg(short = 'q', long, global = true, conflicts_with_all = ["verbose", "debug"])]
    quiet: bool,

    /// Show debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Override safety checks and overwrite existing files
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Confirm before making changes
    #[arg(short = 'i', long, global = true)]
    interactive: bool,

    /// Back up files before overwriting them
    #[arg(long, global = true)]
    backup: bool,

    /// Output as JSON
    #[arg(long, short = 'j', global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        subcommand: ProfileSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let g = &cli.global;

    let default_level = if g.debug {
        tracing::Level::DEBUG
    } else if g.verbose {
        tracing::Level::INFO
    } else if g.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = context(g).and_then(|ctx| match cli.command {
        Some(Commands::Config { subcommand }) => cmd::config::run(&ctx, subcommand),
        Some(Commands::Profile { subcommand }) => cmd::profile::run(&ctx, subcommand),
        None => cmd::create::run(&ctx, cli.create),
    });

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn context(g: &GlobalArgs) -> anyhow::Result<cmd::Context> {
    let config_path = match &g.config {
        Some(p) => p.clone(),
        None => paths::default_config_path()?,
    };
    Ok(cmd::Context {
        config_path,
        json: g.json,
        dry_run: g.dry_run,
        force: g.force,
        interactive: g.interactive,
        backup: g.backup,
        quiet: g.quiet,
        debug: g.debug,
    })
}
