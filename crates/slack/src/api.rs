//! Minimal Slack Web API client.

use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    serde_json::{Value, json},
    tracing::{debug, info},
};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// A `chat.postMessage` request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub channel: String,
    /// Notification fallback shown where blocks are not rendered.
    pub text: String,
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
}

#[derive(Clone)]
pub struct SlackApi {
    http: reqwest::Client,
    base_url: String,
    debug: bool,
}

impl Default for SlackApi {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl SlackApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            debug: false,
        }
    }

    /// Log every API response body at info level.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url.trim_end_matches('/'))
    }

    async fn post_json(&self, method: &str, token: &Secret<String>, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(self.endpoint(method))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;
        self.check(method, resp).await
    }

    async fn post_form(
        &self,
        method: &str,
        token: &Secret<String>,
        form: &[(&str, String)],
    ) -> Result<Value> {
        let resp = self
            .http
            .post(self.endpoint(method))
            .bearer_auth(token.expose_secret())
            .form(form)
            .send()
            .await?;
        self.check(method, resp).await
    }

    async fn check(&self, method: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let body = resp.text().await?;
        if self.debug {
            info!(method, status = %status, body = %body, "slack api response");
        }
        if !status.is_success() {
            return Err(Error::api(method, format!("http {status}: {body}")));
        }

        let value: Value = serde_json::from_str(&body)?;
        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(Error::api(method, error));
        }
        Ok(value)
    }

    /// Post a message; returns its timestamp.
    pub async fn post_message(&self, token: &Secret<String>, message: &ChatMessage) -> Result<String> {
        let body = serde_json::to_value(message)?;
        let resp = self.post_json("chat.postMessage", token, &body).await?;
        let ts = resp
            .get("ts")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(channel_id = %message.channel, ts = %ts, "slack message posted");
        Ok(ts)
    }

    /// Upload a text file and share it into `channel_id` using the external
    /// upload flow. Returns the file id.
    pub async fn upload_file(
        &self,
        token: &Secret<String>,
        channel_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<String> {
        const GET_URL: &str = "files.getUploadURLExternal";

        let ticket = self
            .post_form(GET_URL, token, &[
                ("filename", filename.to_string()),
                ("length", content.len().to_string()),
            ])
            .await?;
        let (Some(upload_url), Some(file_id)) = (
            ticket.get("upload_url").and_then(Value::as_str),
            ticket.get("file_id").and_then(Value::as_str),
        ) else {
            return Err(Error::api(GET_URL, "missing upload_url or file_id"));
        };

        let resp = self
            .http
            .post(upload_url)
            .body(content.to_string())
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api("file upload", format!("http {status}: {body}")));
        }

        self.post_json(
            "files.completeUploadExternal",
            token,
            &json!({
                "files": [{ "id": file_id, "title": filename }],
                "channel_id": channel_id,
                "initial_comment": filename,
            }),
        )
        .await?;
        debug!(channel_id, file_id, filename, "slack file shared");
        Ok(file_id.to_string())
    }

    /// Ask for a Socket Mode WebSocket URL using the app-level token.
    pub async fn open_connection(&self, app_token: &Secret<String>) -> Result<String> {
        const METHOD: &str = "apps.connections.open";
        let resp = self.post_json(METHOD, app_token, &json!({})).await?;
        resp.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::api(METHOD, "missing url"))
    }
}
