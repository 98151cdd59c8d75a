//! Cluster event intake.
//!
//! Accepts both the `events.k8s.io/v1` shape and the core `v1` shape that
//! `kubectl get events -o json` prints.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    kvnts_common::{Labels, Payload, labels},
    serde::Deserialize,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectReference {
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    #[serde(alias = "message")]
    pub note: String,
    #[serde(alias = "involvedObject")]
    pub regarding: ObjectReference,
    #[serde(alias = "firstTimestamp")]
    pub deprecated_first_timestamp: Option<DateTime<Utc>>,
    #[serde(alias = "lastTimestamp")]
    pub deprecated_last_timestamp: Option<DateTime<Utc>>,
    pub event_time: Option<DateTime<Utc>>,
    /// Log excerpt of the regarding pod, when the producer collected one.
    pub logs: Option<String>,
}

impl ClusterEvent {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// `Normal` events are recorded but never forwarded.
    pub fn is_normal(&self) -> bool {
        self.event_type == "Normal"
    }

    pub fn namespace(&self) -> &str {
        &self.regarding.namespace
    }

    /// Per-event labels: namespace, pod, kind, type and reason.
    pub fn labels(&self) -> Labels {
        Labels::from([
            (labels::NAMESPACE.to_string(), self.regarding.namespace.clone()),
            (labels::POD.to_string(), self.regarding.name.clone()),
            (labels::KIND.to_string(), self.regarding.kind.clone()),
            (labels::TYPE.to_string(), self.event_type.clone()),
            (labels::REASON.to_string(), self.reason.clone()),
        ])
    }

    pub fn into_payload(self, common: Arc<Labels>) -> Payload {
        let extra = self.labels();
        let first_seen = self
            .deprecated_first_timestamp
            .or(self.event_time)
            .unwrap_or_else(Utc::now);
        let last_seen = self.deprecated_last_timestamp.unwrap_or(first_seen);

        let payload = Payload::new(
            self.event_type,
            self.note,
            common,
            extra,
            first_seen,
            last_seen,
        );
        match self.logs {
            Some(logs) => payload.with_logs(logs),
            None => payload,
        }
    }
}
