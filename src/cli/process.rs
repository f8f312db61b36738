use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// Stops every process started from `executable`, except for this one and its children.
pub fn kill_previous_servers(executable: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't find own pid: {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| executable == *v)
            .is_some()
        {
            // This will forcefully terminate the process on Windows.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    info!("Stopped {stopped} instances of {executable:?}");
    Ok(stopped)
}

fn daemon_executable() -> Result<PathBuf> {
    Ok(to_daemon_path(env::current_exe()?))
}

/// Shuts down a running daemon and starts a new one watching `app_dir`. The daemon detaches
/// itself.
pub fn restart_server(app_dir: &Path) -> Result<()> {
    let daemon = daemon_executable()?;
    if !daemon.exists() {
        return Err(anyhow!("Daemon executable {daemon:?} is missing"));
    }
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(&daemon);
    // The daemon changes its working directory while detaching.
    command.arg("--dir").arg(std::path::absolute(app_dir)?);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    println!("Spawning");
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        // The daemon forks and the original process exits right away.
        command.status()?;
    }
    #[cfg(not(unix))]
    {
        command.arg("--force");
        #[allow(clippy::zombie_processes)]
        let _ = command.spawn()?;
    }
    println!("Success");
    Ok(())
}
