//! Fan-out of one notification to every configured sink.

use std::{sync::Arc, time::Duration};

use {
    kvnts_common::Payload,
    kvnts_config::{DispatchConfig, FailurePolicy, SinkEntry},
    tracing::{debug, info, warn},
};

use crate::{Error, Result, factory::SinkFactory, identity::SinkIdentity};

/// What happened to one sink during a dispatch.
#[derive(Debug)]
pub enum DeliveryStatus {
    Delivered,
    /// The payload's reason is on the sink's exclusion list.
    Skipped,
    Failed(Error),
    /// A previous sink failed under [`FailurePolicy::FailFast`].
    NotAttempted,
}

#[derive(Debug)]
pub struct SinkOutcome {
    pub identity: SinkIdentity,
    pub status: DeliveryStatus,
}

/// Per-sink outcomes of one dispatch, in configuration order.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<SinkOutcome>,
    /// Set when at least one sink failed: the caller should re-attempt the
    /// whole dispatch after this delay.
    pub retry_after: Option<Duration>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.retry_after.is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SinkIdentity, &Error)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            DeliveryStatus::Failed(e) => Some((&o.identity, e)),
            _ => None,
        })
    }

    pub fn delivered(&self) -> usize {
        self.count(|s| matches!(s, DeliveryStatus::Delivered))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, DeliveryStatus::Skipped))
    }

    fn count(&self, pred: impl Fn(&DeliveryStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Collapse into `Ok(())` or [`Error::Dispatch`].
    pub fn into_result(self) -> Result<()> {
        match self.retry_after {
            None => Ok(()),
            Some(retry_after) => Err(Error::Dispatch {
                failed: self.failures().count(),
                retry_after,
            }),
        }
    }
}

pub struct Dispatcher {
    factory: Arc<SinkFactory>,
    policy: FailurePolicy,
    retry_after: Duration,
}

impl Dispatcher {
    pub fn new(factory: Arc<SinkFactory>, config: &DispatchConfig) -> Self {
        Self {
            factory,
            policy: config.failure_policy,
            retry_after: config.retry_after(),
        }
    }

    pub fn factory(&self) -> &Arc<SinkFactory> {
        &self.factory
    }

    /// Deliver `payload` to every entry in order.
    ///
    /// Entries whose exclusion list contains the payload's reason are
    /// skipped without building a client. Under [`FailurePolicy::FailFast`]
    /// the first failure stops the pass; under
    /// [`FailurePolicy::BestEffort`] every remaining sink is still tried.
    pub async fn dispatch(
        &self,
        scope: &str,
        entries: &[SinkEntry],
        payload: &Payload,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut failed = false;

        for entry in entries {
            let identity = SinkIdentity::new(scope, &entry.namespace, &entry.name);

            let status = if failed && self.policy == FailurePolicy::FailFast {
                DeliveryStatus::NotAttempted
            } else if entry.excludes(payload.reason()) {
                debug!(identity = %identity, reason = payload.reason(), "reason excluded, skipping sink");
                DeliveryStatus::Skipped
            } else {
                match self.deliver(&identity, entry, payload).await {
                    Ok(()) => DeliveryStatus::Delivered,
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "sink delivery failed");
                        failed = true;
                        DeliveryStatus::Failed(e)
                    },
                }
            };
            report.outcomes.push(SinkOutcome { identity, status });
        }

        if failed {
            report.retry_after = Some(self.retry_after);
        } else {
            info!(
                delivered = report.delivered(),
                skipped = report.skipped(),
                reason = payload.reason(),
                "event dispatched"
            );
        }
        report
    }

    async fn deliver(
        &self,
        identity: &SinkIdentity,
        entry: &SinkEntry,
        payload: &Payload,
    ) -> Result<()> {
        let config = entry.sink_config()?;
        let client = self.factory.build(identity, &entry.sink_type, &config).await?;
        client.forward_event(payload).await
    }
}
