use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    kvnts_assistant::CompletionService,
    kvnts_common::Payload,
    kvnts_config::{SinkType, SlackConfig},
    kvnts_sinks::{BuiltSink, ListenerHandle, Sink, SinkIdentity},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    api::SlackApi,
    blocks,
    listener::InteractiveListener,
    socket::SocketModeSource,
};

/// Slack channel client.
pub struct SlackSink {
    api: SlackApi,
    config: SlackConfig,
    interactive: bool,
}

impl SlackSink {
    pub fn new(api: SlackApi, config: SlackConfig, interactive: bool) -> Self {
        Self {
            api,
            config,
            interactive,
        }
    }

    /// Pause after every successful delivery.
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.config.rate_limit_ms)
    }
}

#[async_trait]
impl Sink for SlackSink {
    fn sink_type(&self) -> SinkType {
        SinkType::Slack
    }

    async fn forward_event(&self, payload: &Payload) -> kvnts_sinks::Result<()> {
        let channel_id = &self.config.channel_id;
        let message = blocks::event_message(channel_id, payload, self.interactive);
        self.api
            .post_message(&self.config.bot_token, &message)
            .await?;

        if let Some(logs) = payload.log_excerpt() {
            let filename = payload.log_file_name();
            self.api
                .upload_file(&self.config.bot_token, channel_id, &filename, logs)
                .await?;
            debug!(channel_id = %channel_id, filename = %filename, "log excerpt uploaded");
        }

        tokio::time::sleep(self.rate_limit()).await;
        Ok(())
    }
}

/// Build a Slack client against the public Slack API.
///
/// With a completion service, the message carries an ask-assistant button and
/// an interactive listener is started, tied to `cancel`.
pub fn connect(
    identity: &SinkIdentity,
    config: &SlackConfig,
    completion: Option<Arc<dyn CompletionService>>,
    cancel: CancellationToken,
) -> BuiltSink {
    connect_with(SlackApi::default(), identity, config, completion, cancel)
}

pub fn connect_with(
    api: SlackApi,
    identity: &SinkIdentity,
    config: &SlackConfig,
    completion: Option<Arc<dyn CompletionService>>,
    cancel: CancellationToken,
) -> BuiltSink {
    let api = api.with_debug(config.debug);
    let sink = SlackSink::new(api.clone(), config.clone(), completion.is_some());

    let Some(completion) = completion else {
        return BuiltSink::new(Arc::new(sink));
    };

    let source = SocketModeSource::new(api.clone(), config.app_level_token.clone());
    let listener = InteractiveListener::new(
        source,
        api,
        config.bot_token.clone(),
        config.channel_id.clone(),
        completion,
    );
    info!(identity = %identity, channel_id = %config.channel_id, "starting slack interactive listener");
    let handle = ListenerHandle::spawn(cancel.clone(), listener.run(cancel));

    BuiltSink::new(Arc::new(sink)).with_listener(handle)
}
