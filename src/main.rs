use std::sync::Arc;

use anyhow::{Context, Result};

use shiftwatch::api::{HttpApi, RemoteApi};
use shiftwatch::capture::{CaptureBackend, RealCaptureBackend, SyntheticCaptureBackend};
use shiftwatch::config::{self, AgentConfig};
use shiftwatch::permissions::PermissionProbe;
use shiftwatch::shell::{DesktopShell, InstanceError, InstanceLock, ShellHost};
use shiftwatch::store::Store;
use shiftwatch::Agent;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(if config::debug_mode() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("shiftwatch agent {} starting up...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load_default()?;
    let data_dir = config.resolve_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let shell: Arc<dyn ShellHost> = Arc::new(DesktopShell);

    // Two instances would double-poll and double-upload; the second launch
    // hands focus to the running one and exits.
    let _instance_lock = match InstanceLock::acquire(&data_dir) {
        Ok(lock) => lock,
        Err(InstanceError::AlreadyRunning(pid)) => {
            log::warn!("another shiftwatch instance is running (pid {pid}); focusing it instead");
            shell.focus_window();
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let store = Store::open(data_dir.join("shiftwatch.sqlite3"))?;
    let api: Arc<dyn RemoteApi> = Arc::new(HttpApi::new(&config));
    let backend: Arc<dyn CaptureBackend> = match RealCaptureBackend::discover() {
        Ok(real) => Arc::new(real),
        Err(err) => {
            log::warn!("real capture backend unavailable ({err}); using synthetic frames");
            Arc::new(SyntheticCaptureBackend::new())
        }
    };
    let probe = build_probe(Arc::clone(&backend));

    let agent = Agent::new(config, store, api, backend, probe, shell);
    agent.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutdown signal received");
    agent.shutdown().await;

    Ok(())
}

fn build_probe(backend: Arc<dyn CaptureBackend>) -> Arc<dyn PermissionProbe> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(shiftwatch::permissions::MacosProbe::new(backend))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(shiftwatch::permissions::PortableProbe::new(backend))
    }
}
