use std::{env, path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{get_current_pid, Signal, System};

/// Terminates every other running instance of this executable. Used by both
/// `stop` and `init` so two daemons never count the same session twice.
pub fn kill_previous_daemons(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }
        let is_same_exe = process
            .exe()
            .filter(|v| v.exists())
            .is_some_and(|v| name == v);
        if !is_same_exe {
            continue;
        }

        // SIGTERM lets the daemon flush active sessions. Windows has no
        // graceful option here, so kill_with falls back to a hard kill.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
    }
}

/// Replaces any running daemon with a fresh detached `serve` process. The
/// current executable path stands in for a proper install location, which is
/// good enough in practice.
pub fn restart_daemon() -> Result<()> {
    let process_name = env::current_exe().expect("Can't operate without an executable");
    kill_previous_daemons(&process_name);
    let mut command = std::process::Command::new(process_name);
    command.args(["serve"]);

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
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}
