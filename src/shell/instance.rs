use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;

use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

const PID_FILE_NAME: &str = "shiftwatch.pid";

#[derive(Debug, Error)]
pub enum InstanceError {
    /// Another agent process holds the lock. Two instances would double-poll
    /// and double-upload, so the new launch must exit.
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pid-file lock guaranteeing a single running agent per data directory.
/// Dropping the lock releases it.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(data_dir: &Path) -> Result<Self, InstanceError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(PID_FILE_NAME);

        if let Some(pid) = read_pid(&path) {
            if pid_alive(pid) {
                return Err(InstanceError::AlreadyRunning(pid));
            }
            // Stale pid file from a crashed run.
            log_warn!("removing stale pid file for dead process {pid}");
            let _ = fs::remove_file(&path);
        }

        // create_new maps to O_CREAT | O_EXCL, closing the race between the
        // liveness check above and the write below.
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = read_pid(&path).unwrap_or(0);
                return Err(InstanceError::AlreadyRunning(pid));
            }
            Err(err) => return Err(err.into()),
        };

        write!(file, "{}", std::process::id())?;
        log_info!("instance lock acquired at {}", path.display());

        Ok(Self { path })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    contents.trim().parse::<u32>().ok()
}

fn pid_alive(pid: u32) -> bool {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        ProcessRefreshKind::everything(),
    );
    system.process(target).is_some()
}
