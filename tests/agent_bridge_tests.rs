//! End-to-end wiring: a fully assembled agent uploads while clocked in,
//! exposes the UI bridge surface, and runs the permission flow once.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{temp_store, CountingShell, FakeApi, FakeBackend, FakeProbe};
use shiftwatch::config::AgentConfig;
use shiftwatch::shell::ShellEvent;
use shiftwatch::Agent;

fn test_config() -> AgentConfig {
    AgentConfig {
        capture_interval_secs: 1,
        poll_interval_secs: 1,
        ..AgentConfig::default()
    }
}

fn agent_with(
    api: Arc<FakeApi>,
    backend: Arc<FakeBackend>,
    probe: Arc<FakeProbe>,
    shell: Arc<CountingShell>,
) -> (Agent, tempfile::TempDir) {
    let (store, dir) = temp_store();
    let agent = Agent::new(test_config(), store, api, backend, probe, shell);
    (agent, dir)
}

#[tokio::test]
async fn assembled_agent_uploads_while_clocked_in() {
    let api = FakeApi::clocked_in();
    let backend = FakeBackend::single_display();
    let (agent, _dir) = agent_with(
        api.clone(),
        backend.clone(),
        FakeProbe::combined(),
        Arc::new(CountingShell::default()),
    );

    agent.set_auth_token(Some("tok".into())).await.unwrap();
    agent.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    agent.shutdown().await;

    assert!(backend.capture_calls() >= 1);
    assert!(api.upload_calls() >= 1);
    assert!(agent.upload_failures().await.unwrap().is_empty());
}

#[tokio::test]
async fn permission_flow_runs_once_per_install() {
    let api = FakeApi::clocked_out();
    let probe = FakeProbe::combined();
    let shell = Arc::new(CountingShell::default());
    let (agent, _dir) = agent_with(
        api,
        FakeBackend::single_display(),
        probe.clone(),
        shell.clone(),
    );

    agent.start().await.unwrap();
    agent.shutdown().await;

    // One combined dialog and one screen-prompt trigger on first launch.
    assert_eq!(shell.dialogs.load(Ordering::SeqCst), 1);
    assert_eq!(probe.screen_triggers.load(Ordering::SeqCst), 1);

    let state = agent.permission_state().await;
    assert!(state.camera && state.microphone && state.screen && state.notifications);
}

#[tokio::test]
async fn bridge_surface_round_trips_session_fields() {
    let (agent, _dir) = agent_with(
        FakeApi::clocked_out(),
        FakeBackend::single_display(),
        FakeProbe::combined(),
        Arc::new(CountingShell::default()),
    );

    assert_eq!(agent.auth_token().await.unwrap(), None);
    agent.set_auth_token(Some("tok".into())).await.unwrap();
    agent.set_user_id(Some("user-42".into())).await.unwrap();

    assert_eq!(agent.auth_token().await.unwrap().as_deref(), Some("tok"));
    assert_eq!(agent.user_id().await.unwrap().as_deref(), Some("user-42"));
    assert_eq!(agent.app_version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(agent.platform_name(), std::env::consts::OS);
}

#[tokio::test]
async fn screen_permission_request_reports_a_status_string() {
    let probe = FakeProbe::combined();
    let (agent, _dir) = agent_with(
        FakeApi::clocked_out(),
        FakeBackend::single_display(),
        probe.clone(),
        Arc::new(CountingShell::default()),
    );

    // Before the request flow has run, the non-granular path cannot verify.
    assert_eq!(agent.request_screen_permission().await, "undetermined");

    agent.start().await.unwrap();
    agent.shutdown().await;

    assert_eq!(agent.request_screen_permission().await, "granted");
}

#[tokio::test]
async fn quit_event_stops_monitoring_for_good() {
    let api = FakeApi::clocked_in();
    let backend = FakeBackend::single_display();
    let (agent, _dir) = agent_with(
        api.clone(),
        backend.clone(),
        FakeProbe::combined(),
        Arc::new(CountingShell::default()),
    );

    agent.set_auth_token(Some("tok".into())).await.unwrap();
    agent.start().await.unwrap();

    // Let the immediate first tick settle before quitting.
    tokio::time::sleep(Duration::from_millis(80)).await;
    agent.handle_shell_event(ShellEvent::QuitRequested).await;

    let calls_at_quit = backend.capture_calls();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(backend.capture_calls(), calls_at_quit);
    assert!(!agent.lifecycle().monitor_running().await);
}
