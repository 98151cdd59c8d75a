use std::sync::Arc;

use {
    async_trait::async_trait,
    kvnts_common::Payload,
    kvnts_config::{SinkType, TeamsConfig},
    kvnts_sinks::{BuiltSink, Sink, SinkIdentity},
    secrecy::ExposeSecret,
    tracing::{debug, info},
};

use crate::{card::event_card, error::Error};

/// Teams channel client posting to an incoming webhook.
pub struct TeamsSink {
    http: reqwest::Client,
    config: TeamsConfig,
}

impl TeamsSink {
    pub fn new(config: TeamsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn post(&self, payload: &Payload) -> crate::Result<()> {
        let resp = self
            .http
            .post(self.config.webhook_url.expose_secret())
            .json(&event_card(payload))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Rejected { status, body });
        }
        if self.config.debug {
            let body = resp.text().await.unwrap_or_default();
            info!(status = %status, body = %body, "teams webhook response");
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for TeamsSink {
    fn sink_type(&self) -> SinkType {
        SinkType::MicrosoftTeams
    }

    async fn forward_event(&self, payload: &Payload) -> kvnts_sinks::Result<()> {
        self.post(payload).await?;
        debug!(reason = payload.reason(), "teams card posted");
        Ok(())
    }
}

pub fn connect(identity: &SinkIdentity, config: &TeamsConfig) -> BuiltSink {
    info!(identity = %identity, "teams sink ready");
    BuiltSink::new(Arc::new(TeamsSink::new(config.clone())))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::{TimeZone, Utc},
        kvnts_common::labels,
        mockito::Matcher,
        secrecy::Secret,
        serde_json::json,
        std::collections::BTreeMap,
    };

    fn payload() -> Payload {
        let extra = BTreeMap::from([
            (labels::NAMESPACE.to_string(), "default".to_string()),
            (labels::POD.to_string(), "api-7f".to_string()),
            (labels::REASON.to_string(), "BackOff".to_string()),
        ]);
        let seen = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Payload::new("Warning", "Back-off", Arc::default(), extra, seen, seen)
    }

    fn sink(url: String) -> TeamsSink {
        TeamsSink::new(TeamsConfig {
            webhook_url: Secret::new(url),
            debug: false,
        })
    }

    #[tokio::test]
    async fn posts_adaptive_card() {
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/webhook/abc")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "type": "message",
                "attachments": [{ "contentType": "application/vnd.microsoft.card.adaptive" }],
            })))
            .with_body("1")
            .create_async()
            .await;

        sink(format!("{}/webhook/abc", server.url()))
            .forward_event(&payload())
            .await
            .unwrap();
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_card_is_delivery_error() {
        let mut server = mockito::Server::new_async().await;
        let _hook = server
            .mock("POST", "/webhook/abc")
            .with_status(400)
            .with_body("Bad payload received by generic incoming webhook.")
            .create_async()
            .await;

        let err = sink(format!("{}/webhook/abc", server.url()))
            .forward_event(&payload())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            kvnts_sinks::Error::Delivery {
                sink: SinkType::MicrosoftTeams,
                ..
            }
        ));
        assert!(err.to_string().contains("Bad payload"));
    }
}
