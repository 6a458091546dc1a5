use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use vpkit_core::config::{self, ProjectConfig};
use vpkit_core::device::{DESTROY_COMMAND, launch_command, send_command};
use vpkit_core::tools::SystemTools;
use vpkit_core::{deploy, package, sources, watch};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build and deploy PS Vita homebrew packages", long_about = None)]
struct Args {
    /// Path to the project descriptor (default: vpkit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Package the sources into <outDir>/<title>.vpk (default)
    Build,
    /// Upload the sources to the device and relaunch the app
    Deploy,
    /// Send `launch <id>`, wait two seconds, then send `destroy`
    #[command(name = "test:cmd", alias = "test-cmd")]
    TestCmd,
    /// Deploy again whenever the sources change
    Watch,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = config::load(args.config.as_deref())?;
    sources::check(&config)?;
    let tools = SystemTools::new(&config.tools);

    match args.command.unwrap_or(Commands::Build) {
        Commands::Build => {
            let out = package::build(&config, &tools)?;
            info!(path = %out.display(), "Build finished");
        }
        Commands::Deploy => deploy(&config, &tools)?,
        Commands::TestCmd => test_commands(&config)?,
        Commands::Watch => watch_and_deploy(&config, &tools)?,
    }
    Ok(())
}

fn test_commands(config: &ProjectConfig) -> Result<()> {
    send_command(config, &launch_command(&config.id))?;
    thread::sleep(Duration::from_secs(2));
    send_command(config, DESTROY_COMMAND)?;
    Ok(())
}

fn watch_and_deploy(config: &ProjectConfig, tools: &SystemTools) -> Result<()> {
    watch::watch(
        &config.src_dir,
        &config.tmp_dir,
        watch::DEFAULT_DEBOUNCE,
        |_changed| {
            // Keep watching after a failed deploy.
            match deploy(config, tools) {
                Ok(()) => info!("Redeployed"),
                Err(e) => error!("Deploy failed: {:#}", e),
            }
            ControlFlow::Continue(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_build() {
        let args = Args::parse_from(["vpkit"]);
        assert_eq!(args.command, None);
        assert_eq!(args.command.unwrap_or(Commands::Build), Commands::Build);
    }

    #[test]
    fn test_subcommand_names() {
        let args = Args::parse_from(["vpkit", "test:cmd"]);
        assert_eq!(args.command, Some(Commands::TestCmd));
        let args = Args::parse_from(["vpkit", "test-cmd", "--config", "game.toml"]);
        assert_eq!(args.command, Some(Commands::TestCmd));
        assert_eq!(args.config, Some(PathBuf::from("game.toml")));
        let args = Args::parse_from(["vpkit", "-v", "deploy"]);
        assert_eq!(args.command, Some(Commands::Deploy));
        assert!(args.verbose);
    }
}
