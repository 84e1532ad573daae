//! hubsite CLI
//!
//! Marketing-site generator: Markdown pages, layouts and static assets in,
//! a deployable `dist/` tree out.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use hubsite::cmd::{self, build::Target};

/// Command-line interface for hubsite.
#[derive(Parser)]
#[command(name = "hubsite", version, about = "Build the marketing site")]
struct Cli {
    /// Project root containing pages/, templates/ and assets/
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Path to configuration file, relative to the root (optional)
    #[arg(short, long, default_value = "hubsite.toml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Remove the output directory
    Clean,
    /// Clean, then build pages and assets
    Build,
    /// Build pages only, without cleaning
    BuildPages,
    /// Build assets only, without cleaning
    BuildAssets,
    /// Build, serve the output and rebuild on change with live reload
    Serve {
        /// Port to listen on (default: serve.port, 5000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (default: serve.host, 127.0.0.1)
        #[arg(long)]
        host: Option<String>,
        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },
    /// Validate configuration, pages and layouts without writing
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    hubsite::init_tracing(cli.verbose);

    let root = cli.root.as_path();
    let config = cli.config.as_path();

    match cli.command {
        Commands::Clean => cmd::clean::run(root, config)?,
        Commands::Build => cmd::build::run(root, config, Target::All)?,
        Commands::BuildPages => cmd::build::run(root, config, Target::Pages)?,
        Commands::BuildAssets => cmd::build::run(root, config, Target::Assets)?,
        Commands::Serve { port, host, open } => {
            cmd::serve::run(root, config, port, host, open).await?;
        }
        Commands::Check { strict } => cmd::check::run(root, config, strict)?,
    }

    Ok(())
}
