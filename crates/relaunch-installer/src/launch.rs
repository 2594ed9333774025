use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::CacheLayout;

/// Starts a process and returns without waiting for or supervising it.
pub trait ProcessLauncher {
    fn spawn_detached(&self, program: &Path, working_dir: &Path, args: &[OsString])
        -> Result<()>;
}

impl<T: ProcessLauncher + ?Sized> ProcessLauncher for &T {
    fn spawn_detached(
        &self,
        program: &Path,
        working_dir: &Path,
        args: &[OsString],
    ) -> Result<()> {
        (**self).spawn_detached(program, working_dir, args)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedProcessLauncher;

impl ProcessLauncher for DetachedProcessLauncher {
    fn spawn_detached(
        &self,
        program: &Path,
        working_dir: &Path,
        args: &[OsString],
    ) -> Result<()> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);

        let child = command
            .spawn()
            .with_context(|| format!("failed to start {}", program.display()))?;
        info!(
            program = %program.display(),
            pid = child.id(),
            args = ?args,
            "started detached process"
        );
        Ok(())
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Starts `{cache_root}/{package}/{version}/{binary}` from `working_dir`.
pub fn launch_installed_app(
    launcher: &dyn ProcessLauncher,
    layout: &CacheLayout,
    package: &str,
    version: &str,
    binary: &str,
    working_dir: &Path,
) -> Result<PathBuf> {
    let executable = layout.app_executable_path(package, version, binary);
    if !executable.is_file() {
        return Err(anyhow!(
            "installed version {version} of {package} has no {binary}: {}",
            executable.display()
        ));
    }

    launcher.spawn_detached(&executable, working_dir, &[])?;
    Ok(executable)
}
