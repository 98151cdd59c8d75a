use std::sync::Arc;

use {
    async_trait::async_trait,
    kvnts_common::Payload,
    kvnts_config::{MattermostConfig, SinkType},
    kvnts_sinks::{BuiltSink, Sink, SinkIdentity},
    reqwest::multipart,
    secrecy::ExposeSecret,
    serde_json::{Value, json},
    tracing::{debug, info},
};

use crate::error::{Error, Result};

const POSTS: &str = "/api/v4/posts";
const FILES: &str = "/api/v4/files";

/// Mattermost channel client.
pub struct MattermostSink {
    http: reqwest::Client,
    config: MattermostConfig,
}

impl MattermostSink {
    pub fn new(config: MattermostConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }

    async fn send(&self, endpoint: &'static str, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = req
            .bearer_auth(self.config.bot_token.expose_secret())
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if self.config.debug {
            info!(endpoint, status = %status, body = %body, "mattermost api response");
        }
        if !status.is_success() {
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| Error::UnexpectedResponse {
            endpoint,
            message: e.to_string(),
        })
    }

    /// Upload `content` into the sink's channel; returns the file id.
    async fn upload(&self, filename: &str, content: &str) -> Result<String> {
        let part = multipart::Part::text(content.to_string())
            .file_name(filename.to_string())
            .mime_str("text/plain")?;
        let form = multipart::Form::new()
            .text("channel_id", self.config.channel_id.clone())
            .part("files", part);

        let resp = self
            .send(FILES, self.http.post(self.url(FILES)).multipart(form))
            .await?;
        resp.pointer("/file_infos/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse {
                endpoint: FILES,
                message: "missing file_infos[0].id".into(),
            })
    }

    fn post_body(&self, payload: &Payload, file_ids: &[String]) -> Value {
        let message = format!(
            "🔔 Cluster: **{}**, Type: **{}**, Reason: **{}**, Kind: **{}**\n\n🚦 **Alert:** {}",
            payload.cluster_name(),
            payload.level(),
            payload.reason(),
            payload.kind(),
            payload.note(),
        );
        json!({
            "channel_id": self.config.channel_id,
            "message": message,
            "file_ids": file_ids,
            "props": {
                "attachments": [{
                    "fallback": format!("{} {}", payload.level(), payload.reason()),
                    "color": "#3AA3E3",
                    "text": format!(
                        "• **namespace:** {}\n• **pod:** {}",
                        payload.namespace(),
                        payload.pod()
                    ),
                    "fields": [
                        { "short": true, "title": "First seen", "value": payload.first_seen().to_rfc3339() },
                        { "short": true, "title": "Last seen", "value": payload.last_seen().to_rfc3339() },
                    ],
                }],
            },
        })
    }
}

#[async_trait]
impl Sink for MattermostSink {
    fn sink_type(&self) -> SinkType {
        SinkType::Mattermost
    }

    async fn forward_event(&self, payload: &Payload) -> kvnts_sinks::Result<()> {
        let mut file_ids = Vec::new();
        if let Some(logs) = payload.log_excerpt() {
            file_ids.push(self.upload(&payload.log_file_name(), logs).await?);
        }

        let body = self.post_body(payload, &file_ids);
        self.send(POSTS, self.http.post(self.url(POSTS)).json(&body))
            .await?;
        debug!(channel_id = %self.config.channel_id, files = file_ids.len(), "mattermost post created");
        Ok(())
    }
}

pub fn connect(identity: &SinkIdentity, config: &MattermostConfig) -> BuiltSink {
    info!(identity = %identity, url = %config.url, "mattermost sink ready");
    BuiltSink::new(Arc::new(MattermostSink::new(config.clone())))
}
