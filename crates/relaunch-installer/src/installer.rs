use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

use relaunch_core::InstallerConfig;
use thiserror::Error;
use tracing::{debug, info};

/// External package manager that fetches `package` at `version` and
/// extracts it under `destination`.
pub trait PackageInstaller {
    fn install(&self, package: &str, version: &str, destination: &Path)
        -> Result<(), InstallerFailure>;
}

impl<T: PackageInstaller + ?Sized> PackageInstaller for &T {
    fn install(
        &self,
        package: &str,
        version: &str,
        destination: &Path,
    ) -> Result<(), InstallerFailure> {
        (**self).install(package, version, destination)
    }
}

#[derive(Debug, Error)]
pub enum InstallerFailure {
    #[error("failed to start {program} for {step}")]
    Spawn {
        program: String,
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{program} {step} failed with {status}: stdout='{stdout}' stderr='{stderr}'")]
    Exit {
        program: String,
        step: &'static str,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

/// Drives the `nuget` command line against a single authenticated source.
#[derive(Debug, Clone)]
pub struct NugetInstaller {
    program: String,
    source_name: String,
    source_url: String,
    username: Option<String>,
    token: Option<String>,
}

impl NugetInstaller {
    pub fn from_config(config: &InstallerConfig, token: Option<String>) -> Self {
        Self {
            program: config.program.clone(),
            source_name: config.source_name.clone(),
            source_url: config.source_url.clone(),
            username: config.username.clone(),
            token: token.filter(|value| !value.trim().is_empty()),
        }
    }

    fn register_source(&self) -> Result<(), InstallerFailure> {
        let mut remove = Command::new(&self.program);
        remove
            .args(["sources", "Remove", "-Name"])
            .arg(&self.source_name)
            .arg("-NonInteractive");
        if let Err(err) = self.run(&mut remove, "sources remove") {
            debug!(error = %err, "ignoring failure to remove package source");
        }

        let mut add = Command::new(&self.program);
        add.args(["sources", "Add", "-Name"])
            .arg(&self.source_name)
            .arg("-Source")
            .arg(&self.source_url)
            .arg("-NonInteractive");
        if let (Some(username), Some(token)) = (&self.username, &self.token) {
            add.arg("-UserName").arg(username).arg("-Password").arg(token);
        }
        self.run(&mut add, "sources add")
    }

    fn run(&self, command: &mut Command, step: &'static str) -> Result<(), InstallerFailure> {
        let output = command.output().map_err(|source| InstallerFailure::Spawn {
            program: self.program.clone(),
            step,
            source,
        })?;
        if output.status.success() {
            return Ok(());
        }

        Err(InstallerFailure::Exit {
            program: self.program.clone(),
            step,
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl PackageInstaller for NugetInstaller {
    fn install(
        &self,
        package: &str,
        version: &str,
        destination: &Path,
    ) -> Result<(), InstallerFailure> {
        self.register_source()?;

        info!(package, version, destination = %destination.display(), "installing package");
        let mut install = Command::new(&self.program);
        install
            .arg("install")
            .arg(package)
            .arg("-Version")
            .arg(version)
            .arg("-OutputDirectory")
            .arg(destination)
            .args(["-NoCache", "-NonInteractive", "-Source"])
            .arg(&self.source_name);
        self.run(&mut install, "install")
    }
}
