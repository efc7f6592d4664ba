// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aegis_cache::MemoryBackend;
use aegis_core::{FakeClock, RconConfig};
use aegis_storage::MemoryRepository;

fn supervisor() -> (Arc<Supervisor>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::new());
    let sup = Supervisor::new(
        Cache::new(Arc::new(MemoryBackend::with_clock(FakeClock::new()))),
        repository.clone(),
        ConnectorRegistry::new(),
        SupervisorConfig {
            component_grace: Duration::from_millis(200),
            drain_deadline: Duration::from_millis(500),
            ..SupervisorConfig::default()
        },
    );
    (sup, repository)
}

fn record(id: &str) -> ServerRecord {
    ServerRecord {
        id: id.into(),
        name: format!("Server {id}"),
        rcon: RconConfig {
            // Nothing listens here; the manager retries with backoff,
            // which is exactly the state a freshly added server is in.
            host: "127.0.0.1".into(),
            port: 9,
            password: "pw".into(),
        },
        log_source: None,
    }
}

#[tokio::test]
async fn add_server_wires_the_stack() {
    let (sup, _repo) = supervisor();
    sup.add_server(record("srv-1")).await.unwrap();

    assert_eq!(sup.managed_servers(), vec!["srv-1".into()]);
    assert!(sup.scheduler(&"srv-1".into()).is_some());
    assert!(sup.tracker(&"srv-1".into()).is_some());
    assert!(sup.plugins(&"srv-1".into()).is_some());
    assert!(sup.rcon().health(&"srv-1".into()).is_some());

    sup.shutdown().await;
}

#[tokio::test]
async fn remove_server_tears_down_in_reverse() {
    let (sup, _repo) = supervisor();
    sup.add_server(record("srv-1")).await.unwrap();
    sup.remove_server(&"srv-1".into()).await;

    assert!(sup.managed_servers().is_empty());
    assert!(sup.scheduler(&"srv-1".into()).is_none());
    assert!(sup.rcon().health(&"srv-1".into()).is_none());
}

#[tokio::test]
async fn re_adding_a_server_replaces_the_stack() {
    let (sup, _repo) = supervisor();
    sup.add_server(record("srv-1")).await.unwrap();
    let first = sup.scheduler(&"srv-1".into()).unwrap();
    sup.add_server(record("srv-1")).await.unwrap();
    let second = sup.scheduler(&"srv-1".into()).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(sup.managed_servers().len(), 1);
    sup.shutdown().await;
}

#[tokio::test]
async fn dynamic_plugin_records_go_through_the_signed_loader() {
    let dir = tempfile::tempdir().unwrap();
    let repository = Arc::new(MemoryRepository::new());
    repository.add_trusted_key(aegis_storage::TrustedKeyRecord {
        key_id: "ops".into(),
        public_key_pem: "-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEA\n-----END PUBLIC KEY-----\n"
            .into(),
    });
    // Artifact + signature exist but the signature is garbage: the
    // loader must reject the instance before any code is loaded.
    std::fs::write(dir.path().join("relay.so"), b"bytes").unwrap();
    std::fs::write(dir.path().join("relay.so.sig"), [0u8; 64]).unwrap();
    repository
        .save_plugin_instance(aegis_storage::PluginInstanceRecord {
            id: "inst-dyn".into(),
            server_id: "srv-1".into(),
            plugin_id: "relay".into(),
            config: serde_json::json!({}),
            enabled: true,
            artifact: Some("relay.so".into()),
            sandbox: None,
        })
        .await
        .unwrap();

    let sup = Supervisor::new(
        Cache::new(Arc::new(MemoryBackend::with_clock(FakeClock::new()))),
        repository,
        ConnectorRegistry::new(),
        SupervisorConfig {
            plugin_dir: Some(dir.path().to_path_buf()),
            component_grace: Duration::from_millis(200),
            drain_deadline: Duration::from_millis(500),
            ..SupervisorConfig::default()
        },
    );
    sup.add_server(record("srv-1")).await.unwrap();

    // The rejected instance never registers; the stack still wires.
    let plugins = sup.plugins(&"srv-1".into()).unwrap();
    assert!(plugins.status(&"inst-dyn".into()).is_none());
    sup.shutdown().await;
}

#[tokio::test]
async fn reload_workflows_requires_a_managed_server() {
    let (sup, _repo) = supervisor();
    let err = sup.reload_workflows(&"ghost".into()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::UnknownServer(_)));
}

#[tokio::test]
async fn multiple_supervisors_coexist_in_one_process() {
    let (a, _) = supervisor();
    let (b, _) = supervisor();
    a.add_server(record("srv-a")).await.unwrap();
    b.add_server(record("srv-b")).await.unwrap();

    assert_eq!(a.managed_servers(), vec!["srv-a".into()]);
    assert_eq!(b.managed_servers(), vec!["srv-b".into()]);

    a.shutdown().await;
    // b is unaffected by a's shutdown.
    assert_eq!(b.managed_servers(), vec!["srv-b".into()]);
    b.shutdown().await;
}

#[tokio::test]
async fn shutdown_with_no_servers_returns_promptly() {
    let (sup, _repo) = supervisor();
    tokio::time::timeout(Duration::from_secs(2), sup.shutdown())
        .await
        .unwrap();
}
