use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use relaunch_core::{LaunchError, SelfUpdatePhase, VersionRequest};
use relaunch_installer::{DetachedProcessLauncher, NugetInstaller};
use relaunch_registry::GithubPackagesRegistry;
use tracing::debug;

mod env;
mod logging;
mod render;
mod self_update;
mod startup;

use env::LauncherEnv;
use render::{current_output_style, NotificationLevel, Notifier, TerminalNotifier};
use self_update::UpdateOrchestrator;
use startup::{run_startup, Collaborators, StartupOutcome};

#[derive(Parser, Debug)]
#[command(name = "relaunch")]
#[command(about = "Self-updating application launcher", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch a specific version, e.g. `2.3.1` or `beta-latest`.
    Version { token: String },
    /// Continue a launcher self-update at the given phase (0 = download, 1 = copy).
    Update {
        #[arg(value_parser = parse_phase)]
        phase: SelfUpdatePhase,
    },
}

fn parse_phase(value: &str) -> Result<SelfUpdatePhase, String> {
    SelfUpdatePhase::parse(value).map_err(|err| err.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let notifier = TerminalNotifier::new(current_output_style());

    match run_cli(cli, &notifier) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "startup failed");
            let code = match err.downcast_ref::<LaunchError>() {
                Some(launch_error) => {
                    notifier.notify(NotificationLevel::Error, &launch_error.to_string());
                    launch_error.exit_code()
                }
                None => {
                    notifier.notify(NotificationLevel::Error, &format!("{err:#}"));
                    1
                }
            };
            ExitCode::from(code as u8)
        }
    }
}

fn run_cli(cli: Cli, notifier: &dyn Notifier) -> Result<()> {
    let launcher_dir = match &cli.command {
        Some(Commands::Update {
            phase: SelfUpdatePhase::Copy,
        }) => Some(std::env::current_dir()?),
        _ => None,
    };
    let env = LauncherEnv::discover(cli.config.as_deref(), launcher_dir)?;

    let registry = GithubPackagesRegistry::from_config(&env.config.registry, env.registry_token())?;
    let installer = NugetInstaller::from_config(&env.config.installer, env.installer_token());
    let launcher = DetachedProcessLauncher;
    let collaborators = Collaborators {
        registry: &registry,
        installer: &installer,
        launcher: &launcher,
        notifier,
    };

    match cli.command {
        Some(Commands::Update { phase }) => {
            let updater = UpdateOrchestrator::new(&env, &collaborators);
            if updater.run_phase(phase).is_hand_off() {
                return Ok(());
            }
            // The continuation could not hand off; start the app from this build.
            finish(run_startup(&env, &collaborators, None, false)?)
        }
        Some(Commands::Version { token }) => finish(run_startup(
            &env,
            &collaborators,
            Some(VersionRequest::parse(&token)),
            true,
        )?),
        None => finish(run_startup(&env, &collaborators, None, true)?),
    }
}

fn finish(outcome: StartupOutcome) -> Result<()> {
    match outcome {
        StartupOutcome::HandedOff => debug!("self-update continuation owns the rest of startup"),
        StartupOutcome::Launched {
            version,
            executable,
        } => debug!(version, executable = %executable.display(), "launch complete"),
    }
    Ok(())
}

#[cfg(test)]
mod tests;
