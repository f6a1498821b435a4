//! CLI binary for hsb: sync HearthSim repositories and stage build extraction directories.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hsb_core::patch::{self, PatchState, PrepareOutcome};
use hsb_core::repos::{self, RepoAction};
use hsb_core::{HsbConfig, HsbError, SystemRunner};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hsb", about = "HearthSim build directory helper")]
struct Cli {
    /// Tooling directory holding the repositories and build tree (defaults to current directory)
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Data mount point holding NGDP downloads and persistent build data
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone or pull the external repositories, then update submodules
    UpdateRepositories,

    /// Link build/extracted/<BUILD> to the persistent data for a build
    PreparePatchDirectories {
        /// Build identifier, used verbatim as a directory name
        build: String,
    },

    /// Show what prepare-patch-directories would do for a build
    Status {
        /// Build identifier
        build: String,

        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration as TOML
    Config,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<HsbError>().map_or(1, HsbError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::UpdateRepositories => cmd_update_repositories(&config),
        Commands::PreparePatchDirectories { build } => cmd_prepare(&config, &build),
        Commands::Status { build, json } => cmd_status(&config, &build, json),
        Commands::Config => cmd_config(&config),
    }
}

fn load_config(cli: &Cli) -> Result<HsbConfig> {
    let base_dir = match &cli.base_dir {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("failed to get current directory")?,
    };
    let base_dir = std::path::absolute(&base_dir)
        .with_context(|| format!("failed to resolve {}", base_dir.display()))?;

    let mut config = HsbConfig::load(&base_dir)?;
    if let Some(root) = &cli.data_root {
        config.data_root = std::path::absolute(root)
            .with_context(|| format!("failed to resolve {}", root.display()))?;
    }
    Ok(config)
}

fn cmd_update_repositories(config: &HsbConfig) -> Result<()> {
    let report = repos::update_repositories(config, &SystemRunner)?;

    eprintln!(
        "\nRepositories up to date ({} cloned, {} pulled)",
        report.count(RepoAction::Cloned),
        report.count(RepoAction::Pulled)
    );
    for repo in &report.repositories {
        eprintln!(
            "  {:<20} {}",
            repo.name,
            repo.head.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_prepare(config: &HsbConfig, build: &str) -> Result<()> {
    match patch::prepare_patch_directories(config, &SystemRunner, build)? {
        PrepareOutcome::AlreadyPresent { .. } => {}
        PrepareOutcome::Linked {
            link,
            target,
            relocated,
        } => {
            if relocated {
                eprintln!("Stored downloader output as {}", target.display());
            }
            eprintln!("{} -> {}", link.display(), target.display());
        }
    }
    Ok(())
}

fn cmd_status(config: &HsbConfig, build: &str, json: bool) -> Result<()> {
    let state = patch::inspect_patch_directories(config, build)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    match state {
        PatchState::LinkPresent { link } => {
            println!("{build}: ready ({})", link.display());
        }
        PatchState::DataPresent { target } => {
            println!("{build}: data stored at {}, link missing", target.display());
        }
        PatchState::DownloadReady { source, target } => {
            println!(
                "{build}: downloader output at {} will move to {}",
                source.display(),
                target.display()
            );
        }
        PatchState::DownloadMissing { ngdp_out, ngdp_dir } => {
            println!(
                "{build}: no data; run downloader in {} to populate {}",
                ngdp_dir.display(),
                ngdp_out.display()
            );
        }
    }
    Ok(())
}

/// Effective paths after defaults and overrides are applied.
#[derive(Serialize)]
struct ResolvedConfig<'a> {
    base_dir: PathBuf,
    data_root: &'a PathBuf,
    build_dir: PathBuf,
    ngdp_dir: PathBuf,
    ngdp_out: PathBuf,
    ngdp_data_dir: PathBuf,
    repositories: &'a hsb_core::config::RepositoriesConfig,
}

fn cmd_config(config: &HsbConfig) -> Result<()> {
    let resolved = ResolvedConfig {
        base_dir: config.base_dir.clone(),
        data_root: &config.data_root,
        build_dir: config.build_dir(),
        ngdp_dir: config.ngdp_dir(),
        ngdp_out: config.ngdp_out(),
        ngdp_data_dir: config.ngdp_data_dir(),
        repositories: &config.repositories,
    };
    print!(
        "{}",
        toml::to_string_pretty(&resolved).context("failed to render configuration")?
    );
    Ok(())
}
