// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: pid lock, cache connection, supervisor startup,
//! orderly shutdown.

use crate::config::Config;
use crate::supervisor::{Supervisor, SupervisorConfig};
use aegis_cache::{Cache, RedisBackend};
use aegis_core::ConnectorRegistry;
use aegis_engine::SchedulerConfig;
use aegis_storage::{MemoryRepository, Repository};
use aegis_tracker::TrackerConfig;
use fs2::FileExt;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("another aegisd holds the lock at {0}")]
    LockFailed(String),

    #[error("trusted key {0} declares neither public_key_pem nor public_key_file")]
    TrustedKey(String),

    #[error("cache connection failed: {0}")]
    Cache(#[from] aegis_cache::CacheError),

    #[error("storage error: {0}")]
    Storage(#[from] aegis_storage::StorageError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] crate::supervisor::SupervisorError),
}

/// A started daemon.
pub struct Started {
    pub supervisor: Arc<Supervisor>,
    /// Held for the process lifetime; dropping releases the pid lock.
    pub lock: File,
}

/// Acquire the pid lock, connect the cache, and wire every configured
/// server.
pub async fn startup(config: &Config) -> Result<Started, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let lock = acquire_lock(config)?;

    let backend = RedisBackend::connect(&config.cache_url).await?;
    let cache = Cache::new(Arc::new(backend));

    // Standalone mode keeps server records in memory, seeded from the
    // config file; the admin layer substitutes its own repository.
    let repository = Arc::new(MemoryRepository::new());
    for key in &config.trusted_keys {
        repository.add_trusted_key(key.resolve()?);
    }
    let repository: Arc<dyn Repository> = repository;
    for server in &config.servers {
        repository.upsert_server(server.clone()).await?;
    }

    let supervisor = Supervisor::new(
        cache,
        Arc::clone(&repository),
        ConnectorRegistry::new(),
        SupervisorConfig {
            tracker: TrackerConfig {
                refresh_interval: Duration::from_secs(config.tracker_refresh_secs.max(1)),
            },
            scheduler: SchedulerConfig::default(),
            component_grace: Duration::from_secs(config.component_grace_secs),
            drain_deadline: Duration::from_secs(config.drain_deadline_secs),
            plugin_dir: config.plugin_dir.clone(),
        },
    );

    for server in repository.list_servers().await? {
        supervisor.add_server(server).await?;
    }

    Ok(Started { supervisor, lock })
}

fn acquire_lock(config: &Config) -> Result<File, LifecycleError> {
    let path = config.lock_path();
    let file = File::create(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(path.display().to_string()))?;
    // Best-effort pid note for operators; the flock is the authority.
    let _ = std::fs::write(&path, format!("{}\n", std::process::id()));
    Ok(file)
}
