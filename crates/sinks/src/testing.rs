//! In-crate fakes for registry, factory and dispatcher tests.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::{TimeZone, Utc},
    kvnts_common::{Payload, labels},
    kvnts_config::{SinkConfig, SinkEntry, SinkType, SlackConfig},
    secrecy::Secret,
    tokio_util::sync::CancellationToken,
};

use crate::{
    Error, Result,
    identity::SinkIdentity,
    sink::{BuiltSink, ListenerHandle, Sink, SinkConnector},
};

pub struct FakeSink {
    pub id: usize,
    pub fail: bool,
    pub delivered: AtomicUsize,
}

#[async_trait]
impl Sink for FakeSink {
    fn sink_type(&self) -> SinkType {
        SinkType::Slack
    }

    async fn forward_event(&self, _payload: &Payload) -> Result<()> {
        if self.fail {
            return Err(Error::delivery(
                SinkType::Slack,
                "chat.postMessage",
                std::io::Error::other("channel_not_found"),
            ));
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fake_sink(id: usize, fail: bool) -> Arc<FakeSink> {
    Arc::new(FakeSink {
        id,
        fail,
        delivered: AtomicUsize::new(0),
    })
}

/// A built sink whose listener waits on a fresh token; returns the token so
/// tests can observe teardown.
pub fn built_with_listener(id: usize) -> (BuiltSink, CancellationToken) {
    let cancel = CancellationToken::new();
    let observer = cancel.clone();
    let token = cancel.clone();
    let listener = ListenerHandle::spawn(cancel, async move { token.cancelled().await });
    (
        BuiltSink::new(fake_sink(id, false)).with_listener(listener),
        observer,
    )
}

/// A built sink whose listener keeps running for `linger` after cancellation;
/// the flag flips once the task has actually exited.
pub fn built_with_slow_listener(id: usize, linger: Duration) -> (BuiltSink, Arc<AtomicBool>) {
    let exited = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&exited);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let listener = ListenerHandle::spawn(cancel, async move {
        token.cancelled().await;
        tokio::time::sleep(linger).await;
        flag.store(true, Ordering::SeqCst);
    });
    (BuiltSink::new(fake_sink(id, false)).with_listener(listener), exited)
}

/// Connector that records every construction.
#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicUsize,
    pub tokens: Mutex<Vec<CancellationToken>>,
    pub sinks: Mutex<Vec<Arc<FakeSink>>>,
    /// Channel ids whose sinks fail every delivery.
    pub failing_channels: Mutex<HashSet<String>>,
    pub delay: Option<Duration>,
}

impl FakeConnector {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_channel(&self, channel: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel.to_string());
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn token(&self, index: usize) -> CancellationToken {
        self.tokens.lock().unwrap()[index].clone()
    }

    pub fn delivered(&self) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.delivered.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl SinkConnector for FakeConnector {
    async fn connect(
        &self,
        _identity: &SinkIdentity,
        config: &SinkConfig,
        cancel: CancellationToken,
    ) -> Result<BuiltSink> {
        let id = self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fail = match config {
            SinkConfig::Slack(cfg) => self
                .failing_channels
                .lock()
                .unwrap()
                .contains(&cfg.channel_id),
            _ => false,
        };
        let sink = fake_sink(id, fail);
        self.sinks.lock().unwrap().push(Arc::clone(&sink));
        self.tokens.lock().unwrap().push(cancel.clone());

        let token = cancel.clone();
        let listener = ListenerHandle::spawn(cancel, async move { token.cancelled().await });
        Ok(BuiltSink::new(sink).with_listener(listener))
    }
}

pub fn slack(channel: &str) -> SlackConfig {
    SlackConfig {
        bot_token: Secret::new("xoxb-test".into()),
        channel_id: channel.into(),
        app_level_token: Secret::new("xapp-test".into()),
        debug: false,
        rate_limit_ms: 0,
    }
}

pub fn slack_config(channel: &str) -> SinkConfig {
    SinkConfig::Slack(slack(channel))
}

pub fn slack_entry(name: &str, channel: &str) -> SinkEntry {
    SinkEntry {
        name: name.into(),
        slack: Some(slack(channel)),
        ..SinkEntry::default()
    }
}

pub fn payload(reason: &str) -> Payload {
    let common = BTreeMap::from([(labels::CLUSTER_NAME.to_string(), "kind".to_string())]);
    let extra = BTreeMap::from([
        (labels::NAMESPACE.to_string(), "default".to_string()),
        (labels::POD.to_string(), "api-7f".to_string()),
        (labels::KIND.to_string(), "Pod".to_string()),
        (labels::TYPE.to_string(), "Warning".to_string()),
        (labels::REASON.to_string(), reason.to_string()),
    ]);
    let seen = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Payload::new(
        "Warning",
        "Back-off restarting failed container",
        Arc::new(common),
        extra,
        seen,
        seen,
    )
}
