//! Long-running harvester process.
//!
//! Guards against a second instance with a PID file, runs the poller until
//! SIGINT/SIGTERM and shuts it down cooperatively.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::{AppContext, HarvestError, Result};

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("harvester").join("daemon.pid"))
    }

    /// PID recorded by a live instance, if any.
    pub fn running_pid() -> Option<u32> {
        let pid = read_pid(&Self::pid_file_path()?)?;
        Self::process_exists(pid).then_some(pid)
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run until a termination signal arrives.
    pub async fn run(&self) -> Result<()> {
        if let Some(pid) = Self::running_pid() {
            return Err(HarvestError::Other(format!(
                "Another harvester instance is already running (PID {})",
                pid
            )));
        }

        self.write_pid_file()
            .map_err(|e| HarvestError::Other(format!("Failed to write PID file: {}", e)))?;

        let result = self.run_until_signal().await;
        self.remove_pid_file();
        result
    }

    async fn run_until_signal(&self) -> Result<()> {
        info!(pid = std::process::id(), "Harvester daemon started");

        // The poller keeps probing, so a failed handshake is not fatal here.
        match self.ctx.gate.connect().await {
            Ok(state) => info!(state = ?state, "Connected to source"),
            Err(e) => warn!(kind = ?e.kind(), error = %e, "Source handshake failed"),
        }

        let poller = self.ctx.poller();
        let handle = poller.start();

        shutdown_signal().await?;
        info!("Shutdown requested");

        poller.stop();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Polling task ended abnormally");
            }
        }

        let snapshot = poller.snapshot();
        info!(
            state = ?snapshot.state,
            cycles = snapshot.cycles,
            cursor = ?snapshot.cursor,
            "Harvester daemon shut down"
        );
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

#[cfg(windows)]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn read_pid(path: &std::path::Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> std::result::Result<u32, String> {
    let pid_path =
        Daemon::pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No harvester is running (PID file not found)".to_string());
    }

    let pid = read_pid(&pid_path).ok_or_else(|| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();

    let status = status.map_err(|e| format!("Failed to send signal: {}", e))?;
    if status.success() {
        Ok(pid)
    } else {
        let _ = fs::remove_file(&pid_path);
        Err(format!("Failed to stop harvester (PID {}); removed stale PID file", pid))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::pid_file_path() {
        Some(pid_path) if pid_path.exists() => match Daemon::running_pid() {
            Some(pid) => format!("Harvester is running (PID: {})", pid),
            None => "Harvester is not running (stale PID file)".to_string(),
        },
        _ => "Harvester is not running".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");

        assert_eq!(read_pid(&path), None);

        fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path), Some(4242));

        fs::write(&path, "not a pid").unwrap();
        assert_eq!(read_pid(&path), None);
    }

    #[test]
    fn test_pid_file_path_is_namespaced() {
        if let Some(path) = Daemon::pid_file_path() {
            assert!(path.ends_with("harvester/daemon.pid"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_own_process_exists() {
        assert!(Daemon::process_exists(std::process::id()));
    }
}
