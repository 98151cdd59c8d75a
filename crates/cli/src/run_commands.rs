use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    chrono::Utc,
    kvnts_assistant::{CompletionService, OpenAiCompletion},
    kvnts_common::Labels,
    kvnts_config::{AssistantConfig, KvntsConfig, Severity, SinkEntry, validate::validate_config},
    kvnts_sinks::{Dispatcher, SinkFactory, SinkRegistry},
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, BufReader},
        time::MissedTickBehavior,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    connector::LiveConnector,
    event::ClusterEvent,
    event_log::{EventLog, Level},
};

/// How often idle cached clients are checked for expiry.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Feeds cluster events into the dispatcher, one at a time.
pub struct EventPump {
    dispatcher: Dispatcher,
    scope: String,
    common: Arc<Labels>,
    by_namespace: HashMap<String, Vec<SinkEntry>>,
    max_attempts: u32,
    event_log: Option<EventLog>,
}

impl EventPump {
    pub fn new(dispatcher: Dispatcher, config: &KvntsConfig) -> Self {
        let mut by_namespace: HashMap<String, Vec<SinkEntry>> = HashMap::new();
        for entry in &config.sinks {
            by_namespace
                .entry(entry.namespace.clone())
                .or_default()
                .push(entry.clone());
        }
        Self {
            dispatcher,
            scope: config.cluster_name().to_string(),
            common: Arc::new(config.labels.clone()),
            by_namespace,
            max_attempts: config.dispatch.max_attempts.max(1),
            event_log: EventLog::from_config(&config.loki),
        }
    }

    /// Read newline-delimited JSON events until EOF or `shutdown`.
    ///
    /// Shutdown also abandons the event being delivered, retries included.
    pub async fn run<R>(&self, reader: R, shutdown: &CancellationToken) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut purge = tokio::time::interval(PURGE_INTERVAL);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = purge.tick() => {
                    let purged = self.dispatcher.factory().registry().purge_expired();
                    if purged > 0 {
                        debug!(purged, "expired sink clients purged");
                    }
                },
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read event stream")? else {
                        info!("event stream closed");
                        break;
                    };
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            warn!("shutdown during delivery, event abandoned");
                            break;
                        },
                        () = self.handle_line(&line, shutdown) => {},
                    }
                },
            }
        }
        Ok(())
    }

    async fn handle_line(&self, line: &str, shutdown: &CancellationToken) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let event = match ClusterEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed event");
                return;
            },
        };
        if let Err(e) = self.handle(event, shutdown).await {
            error!(error = %e, "event dropped");
        }
    }

    /// Record one event in the event log, then forward it to the sinks of
    /// its namespace.
    ///
    /// A failed dispatch is re-attempted after the dispatcher's retry delay,
    /// up to `max_attempts` dispatches in total.
    pub async fn handle(
        &self,
        event: ClusterEvent,
        shutdown: &CancellationToken,
    ) -> kvnts_sinks::Result<()> {
        self.record(&event).await;
        if event.is_normal() {
            debug!(reason = %event.reason, "normal event, not forwarded");
            return Ok(());
        }
        let Some(entries) = self.by_namespace.get(event.namespace()) else {
            debug!(namespace = event.namespace(), "no sinks for namespace");
            return Ok(());
        };

        let payload = event.into_payload(Arc::clone(&self.common));
        let mut attempt = 1;
        loop {
            let report = self
                .dispatcher
                .dispatch(&self.scope, entries, &payload)
                .await;
            let Some(delay) = report.retry_after else {
                return Ok(());
            };
            if attempt >= self.max_attempts {
                return report.into_result();
            }

            warn!(
                attempt,
                retry_after_secs = delay.as_secs(),
                reason = payload.reason(),
                "dispatch failed, retrying"
            );
            tokio::select! {
                () = shutdown.cancelled() => return report.into_result(),
                () = tokio::time::sleep(delay) => {},
            }
            attempt += 1;
        }
    }

    /// Push to the event log. Failures are logged and never block delivery.
    async fn record(&self, event: &ClusterEvent) {
        let Some(log) = &self.event_log else {
            return;
        };
        let level = if event.is_normal() {
            Level::Info
        } else {
            Level::Warn
        };
        let mut labels = (*self.common).clone();
        labels.extend(event.labels());
        if let Err(e) = log.push(level, labels, &event.note, Utc::now()).await {
            warn!(error = %e, reason = %event.reason, "failed to record event");
        }
    }
}

/// Refuse to start on configuration errors that affect every event.
///
/// Errors confined to one sink entry are logged; that entry fails on its own
/// at dispatch time.
fn check_startup(config: &KvntsConfig) -> Result<()> {
    let result = validate_config(config);
    for diag in &result.diagnostics {
        if diag.severity != Severity::Info {
            warn!(category = diag.category, path = %diag.path, "{}", diag.message);
        }
    }
    let fatal: Vec<String> = result
        .fatal()
        .map(|d| format!("{}: {}", d.path, d.message))
        .collect();
    if !fatal.is_empty() {
        bail!("invalid configuration: {}", fatal.join("; "));
    }
    Ok(())
}

fn completion_service(config: &AssistantConfig) -> Result<Option<Arc<dyn CompletionService>>> {
    if !config.enabled {
        return Ok(None);
    }
    let service = OpenAiCompletion::from_env(config.model.as_deref(), config.base_url.as_deref())
        .context("assistant is enabled but could not be configured")?;
    info!(model = service.model(), "assistant enabled");
    Ok(Some(Arc::new(service)))
}

pub async fn handle_run(config: KvntsConfig, events: Option<PathBuf>) -> Result<()> {
    check_startup(&config)?;
    let completion = completion_service(&config.assistant)?;
    let registry = Arc::new(SinkRegistry::from_config(&config.cache));
    let factory = Arc::new(SinkFactory::new(
        registry,
        Arc::new(LiveConnector::new(completion)),
    ));
    let pump = EventPump::new(
        Dispatcher::new(Arc::clone(&factory), &config.dispatch),
        &config,
    );
    info!(
        cluster = config.cluster_name(),
        sinks = config.sinks.len(),
        "forwarding cluster events"
    );

    let shutdown = CancellationToken::new();
    let interrupt = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        })
    };

    let result = match events {
        Some(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => pump.run(BufReader::new(file), &shutdown).await,
            Err(e) => Err(anyhow::Error::new(e).context(format!("failed to open {}", path.display()))),
        },
        None => pump.run(BufReader::new(tokio::io::stdin()), &shutdown).await,
    };

    interrupt.abort();
    factory.shutdown().await;
    result
}
