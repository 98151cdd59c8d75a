//! Event log shipped to Grafana Loki.
//!
//! One push per event, through the JSON flavour of the push API.

use {
    anyhow::{Context, Result, bail},
    chrono::{DateTime, Utc},
    kvnts_common::Labels,
    kvnts_config::LokiConfig,
    serde::Serialize,
};

const PUSH_PATH: &str = "loki/api/v1/push";
const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Value of the `level` stream label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }
}

#[derive(Serialize)]
struct PushRequest {
    streams: Vec<Stream>,
}

#[derive(Serialize)]
struct Stream {
    stream: Labels,
    /// `[unix epoch nanoseconds, line]` pairs.
    values: Vec<[String; 2]>,
}

pub struct EventLog {
    http: reqwest::Client,
    push_url: String,
    tenant_id: Option<String>,
}

impl EventLog {
    /// `None` when no Loki URL is configured.
    pub fn from_config(config: &LokiConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        Some(Self {
            http: reqwest::Client::new(),
            push_url: format!("{}/{PUSH_PATH}", config.url.trim().trim_end_matches('/')),
            tenant_id: config.tenant_id.clone(),
        })
    }

    pub async fn push(
        &self,
        level: Level,
        mut labels: Labels,
        line: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        labels.insert("level".into(), level.as_str().into());
        let body = PushRequest {
            streams: vec![Stream {
                stream: labels,
                values: vec![[
                    at.timestamp_nanos_opt().unwrap_or_default().to_string(),
                    line.to_string(),
                ]],
            }],
        };

        let mut request = self.http.post(&self.push_url).json(&body);
        if let Some(tenant) = &self.tenant_id {
            request = request.header(TENANT_HEADER, tenant);
        }
        let resp = request.send().await.context("loki push failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("loki rejected the push ({status}): {body}");
        }
        Ok(())
    }
}
