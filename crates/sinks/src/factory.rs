//! Build-or-reuse front end over the [`SinkRegistry`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    kvnts_config::{SinkConfig, SinkType},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    identity::SinkIdentity,
    registry::{Insert, SinkRegistry},
    sink::{Sink, SinkConnector},
};

/// Resolves a configured sink to a live client, reusing the cached one when
/// its configuration is unchanged and rebuilding it otherwise.
pub struct SinkFactory {
    registry: Arc<SinkRegistry>,
    connector: Arc<dyn SinkConnector>,
    ttl: Duration,
    root: CancellationToken,
    build_locks: Mutex<HashMap<SinkIdentity, Arc<tokio::sync::Mutex<()>>>>,
}

impl SinkFactory {
    pub fn new(registry: Arc<SinkRegistry>, connector: Arc<dyn SinkConnector>) -> Self {
        let ttl = registry.default_ttl();
        Self {
            registry,
            connector,
            ttl,
            root: CancellationToken::new(),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// TTL applied to every entry this factory inserts.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn registry(&self) -> &Arc<SinkRegistry> {
        &self.registry
    }

    /// Return a live client for `identity`.
    ///
    /// `sink_type` is the raw type string from configuration. An unknown type
    /// fails with [`Error::UnsupportedType`] without touching the connector;
    /// invalid credentials fail with [`Error::Config`] and nothing is cached.
    pub async fn build(
        &self,
        identity: &SinkIdentity,
        sink_type: &str,
        config: &SinkConfig,
    ) -> Result<Arc<dyn Sink>> {
        let sink_type: SinkType = sink_type.parse()?;
        if config.sink_type() != sink_type {
            return Err(Error::config(format!(
                "{} configuration given for a {sink_type} sink",
                config.sink_type()
            )));
        }

        let lock = self.build_lock(identity);
        let result = {
            let _guard = lock.lock().await;
            self.build_locked(identity, sink_type, config).await
        };
        self.release_build_lock(identity, lock);
        result
    }

    async fn build_locked(
        &self,
        identity: &SinkIdentity,
        sink_type: SinkType,
        config: &SinkConfig,
    ) -> Result<Arc<dyn Sink>> {
        if let Some(cached) = self.registry.lookup(identity) {
            if cached.config == *config {
                return Ok(cached.client);
            }
            info!(identity = %identity, "sink configuration changed, rebuilding");
            self.registry.remove(identity);
        }

        config.validate()?;

        let cancel = self.root.child_token();
        let built = self
            .connector
            .connect(identity, config, cancel.clone())
            .await
            .inspect_err(|e| {
                cancel.cancel();
                warn!(identity = %identity, sink_type = %sink_type, error = %e, "failed to build sink");
            })?;

        match self
            .registry
            .try_insert(identity.clone(), built, config.clone(), Some(self.ttl))
        {
            Insert::Inserted(client) => {
                info!(identity = %identity, sink_type = %sink_type, "sink built");
                Ok(client)
            },
            Insert::Occupied { winner, rejected } => {
                debug!(identity = %identity, "concurrent build lost, discarding candidate");
                rejected.teardown();
                Ok(winner)
            },
        }
    }

    fn build_lock(&self, identity: &SinkIdentity) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.build_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(identity.clone()).or_default())
    }

    fn release_build_lock(&self, identity: &SinkIdentity, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.build_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this caller hold it: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(identity);
        }
    }

    /// Cancel every listener this factory started, empty the registry and
    /// wait for the cached listeners to exit.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.registry.shutdown().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
