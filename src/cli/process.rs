use std::{path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

/// Terminates every running process whose executable is `daemon_path`. The
/// current process and its children are skipped so `init` does not kill the
/// daemon it just spawned.
pub fn kill_previous_daemons(daemon_path: &Path) {
    let system = System::new_all();
    let own_pid = get_current_pid().expect("Own pid should always resolve");

    let daemons = system.processes().iter().filter(|(pid, process)| {
        **pid != own_pid
            && process.parent() != Some(own_pid)
            && process
                .exe()
                .is_some_and(|exe| exe.exists() && exe == daemon_path)
    });

    for (pid, process) in daemons {
        info!("Stopping daemon process {pid}");
        // Windows has no Term; kill_with reports that as None and we fall
        // back to a forceful kill.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
    }
}

/// Replaces any running daemon with a fresh one. The daemon binary detaches
/// itself, spawning it is enough.
pub fn restart_daemon(daemon_path: &Path) -> Result<()> {
    kill_previous_daemons(daemon_path);

    let mut command = std::process::Command::new(daemon_path);
    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    println!("Spawning daemon");
    #[allow(clippy::zombie_processes)]
    command.spawn()?;
    println!("Success");
    Ok(())
}
