// Keeps the daemon from opening a console window on windows. Disable during
// development to see stdout.
#![windows_subsystem = "windows"]

use anyhow::Result;
use clap::Parser;
use worklens::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() {
    let args = std::env::args().collect::<Vec<_>>();
    run_service(args).unwrap();
}

/// Without `--force` the process first detaches itself from the launching
/// console and exits; the detached child carries `--force` and runs the
/// actual daemon.
fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    if !args.force {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                return spawn_detached(command_args);
            } else if #[cfg(unix)] {
                if fork_to_background()? {
                    return Ok(());
                }
            }
        }
    }

    run(args)
}

#[cfg(feature = "win")]
fn spawn_detached(mut command_args: Vec<String>) -> Result<()> {
    use std::os::windows::process::CommandExt;
    use windows::Win32::System::Threading::DETACHED_PROCESS;

    command_args.push("--force".into());
    let daemon_exe = std::env::current_exe()?;
    println!("Detaching {daemon_exe:?}");

    let mut command = std::process::Command::new(daemon_exe);
    command
        .args(command_args.into_iter().skip(1))
        .creation_flags(DETACHED_PROCESS.0)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    #[allow(clippy::zombie_processes)]
    command.spawn()?;
    println!("Created daemon");
    Ok(())
}

/// Returns true on the parent side, which should just report and exit.
#[cfg(unix)]
fn fork_to_background() -> Result<bool> {
    use daemonize::{Daemonize, Outcome, Stdio};
    use tracing::error;

    // stdin is redirected to /dev/null by the library itself.
    let outcome = Daemonize::new()
        .stdout(Stdio::devnull())
        .stderr(Stdio::devnull())
        .execute();
    match outcome {
        Outcome::Parent(parent) => {
            parent.inspect_err(|e| error!("Failed to create daemon on parent side {e:?}"))?;
            println!("Created daemon");
            Ok(true)
        }
        Outcome::Child(_) => Ok(false),
    }
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    single_thread_runtime()?.block_on(start_daemon(app_dir))?;
    Ok(())
}
