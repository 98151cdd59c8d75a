//! The normalized record of one cluster event, ready for delivery to any sink.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};

/// Well-known label keys.
pub mod labels {
    pub const CLUSTER_NAME: &str = "cluster_name";
    pub const NAMESPACE: &str = "namespace";
    pub const POD: &str = "pod";
    pub const KIND: &str = "kind";
    pub const TYPE: &str = "type";
    pub const REASON: &str = "reason";
}

pub type Labels = BTreeMap<String, String>;

/// A single notification. Built once per event and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    level: String,
    note: String,
    /// Shared by every payload produced by this process.
    common_labels: Arc<Labels>,
    extra_labels: Labels,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    logs: Option<String>,
}

impl Payload {
    pub fn new(
        level: impl Into<String>,
        note: impl Into<String>,
        common_labels: Arc<Labels>,
        extra_labels: Labels,
        first_seen: DateTime<Utc>,
        last_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            level: level.into(),
            note: note.into(),
            common_labels,
            extra_labels,
            first_seen,
            last_seen,
            logs: None,
        }
    }

    #[must_use]
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn common_labels(&self) -> &Labels {
        &self.common_labels
    }

    pub fn extra_labels(&self) -> &Labels {
        &self.extra_labels
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Per-event labels win over common ones. Missing labels read as "".
    pub fn label(&self, key: &str) -> &str {
        self.extra_labels
            .get(key)
            .or_else(|| self.common_labels.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn cluster_name(&self) -> &str {
        self.label(labels::CLUSTER_NAME)
    }

    pub fn namespace(&self) -> &str {
        self.label(labels::NAMESPACE)
    }

    pub fn pod(&self) -> &str {
        self.label(labels::POD)
    }

    pub fn kind(&self) -> &str {
        self.label(labels::KIND)
    }

    pub fn reason(&self) -> &str {
        self.label(labels::REASON)
    }

    /// The log excerpt, if one was attached and it is not blank.
    pub fn log_excerpt(&self) -> Option<&str> {
        self.logs.as_deref().filter(|logs| !logs.trim().is_empty())
    }

    /// File name used when a sink uploads the log excerpt.
    pub fn log_file_name(&self) -> String {
        format!("{}/{}.log", self.namespace(), self.pod())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        let common: Labels = [(labels::CLUSTER_NAME.to_string(), "prod-eu".to_string())].into();
        let extra: Labels = [
            (labels::NAMESPACE.to_string(), "default".to_string()),
            (labels::POD.to_string(), "api-7f".to_string()),
            (labels::REASON.to_string(), "BackOff".to_string()),
        ]
        .into();
        let now = Utc::now();
        Payload::new("Warning", "CrashLoopBackOff", Arc::new(common), extra, now, now)
    }

    #[test]
    fn labels_resolve_from_both_maps() {
        let p = payload();
        assert_eq!(p.cluster_name(), "prod-eu");
        assert_eq!(p.namespace(), "default");
        assert_eq!(p.reason(), "BackOff");
        assert_eq!(p.kind(), "");
    }

    #[test]
    fn blank_logs_are_not_an_excerpt() {
        assert_eq!(payload().log_excerpt(), None);
        assert_eq!(payload().with_logs("  \n").log_excerpt(), None);
        assert_eq!(payload().with_logs("boom").log_excerpt(), Some("boom"));
    }

    #[test]
    fn log_file_name_uses_namespace_and_pod() {
        assert_eq!(payload().log_file_name(), "default/api-7f.log");
    }
}
