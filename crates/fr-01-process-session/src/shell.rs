//! Platform shell selection and process termination.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

/// Interpreter used to run command text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shell {
    pub program: &'static str,
    pub flag: &'static str,
}

/// `bash -c` on Linux, `zsh -c` on macOS, `cmd.exe /C` on Windows.
///
/// Falls back to `sh -c` when the preferred unix shell is not installed.
pub fn platform_shell() -> Shell {
    #[cfg(target_os = "linux")]
    {
        preferred_or_sh("/bin/bash", "bash")
    }
    #[cfg(target_os = "macos")]
    {
        preferred_or_sh("/bin/zsh", "zsh")
    }
    #[cfg(windows)]
    {
        Shell {
            program: "cmd.exe",
            flag: "/C",
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        Shell {
            program: "sh",
            flag: "-c",
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn preferred_or_sh(path: &str, program: &'static str) -> Shell {
    let program = if std::path::Path::new(path).exists() {
        program
    } else {
        "sh"
    };
    Shell { program, flag: "-c" }
}

impl Shell {
    /// Build the command: stdin closed, both output streams piped, own
    /// process group on unix.
    pub(crate) fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.arg(self.flag)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Send `signal` to every process in the group led by `pid`.
#[cfg(unix)]
#[allow(unsafe_code)]
fn signal_group(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    unsafe { libc::kill(-pgid, signal) == 0 }
}

/// Interrupt the process group, then kill it if it outlives `grace`.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        if signal_group(pid, libc::SIGINT) {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(pid, %status, "process exited after interrupt");
                    // Stragglers that ignored SIGINT still hold the pipes.
                    signal_group(pid, libc::SIGKILL);
                    return;
                }
                Ok(Err(e)) => debug!(pid, error = %e, "wait after interrupt failed"),
                Err(_) => debug!(pid, "interrupt grace expired"),
            }
        }
        signal_group(pid, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        debug!(error = %e, "kill failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_shell() {
        let shell = platform_shell();
        #[cfg(unix)]
        assert_eq!(shell.flag, "-c");
        #[cfg(windows)]
        assert_eq!(shell, Shell { program: "cmd.exe", flag: "/C" });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_interrupts_group() {
        let mut child = platform_shell().command("sleep 30").spawn().unwrap();
        let started = std::time::Instant::now();
        terminate(&mut child, Duration::from_secs(2)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_after_grace() {
        let mut child = platform_shell()
            .command("trap '' INT; sleep 30")
            .spawn()
            .unwrap();
        // Let the shell install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;
        terminate(&mut child, Duration::from_millis(200)).await;
        assert!(child.try_wait().unwrap().is_some());
    }
}
