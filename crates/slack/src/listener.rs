//! Interactive response loop.
//!
//! Acknowledges every envelope first, then turns "ask assistant" clicks into
//! completion requests and posts the answer back to the sink's channel.

use std::sync::Arc;

use {
    kvnts_assistant::CompletionService,
    secrecy::Secret,
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    api::SlackApi,
    blocks,
    socket::{Envelope, EventSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Initializing,
    Listening,
    Processing,
    Closed,
}

pub struct InteractiveListener<S> {
    source: S,
    api: SlackApi,
    bot_token: Secret<String>,
    channel_id: String,
    completion: Arc<dyn CompletionService>,
    state: watch::Sender<ListenerState>,
}

impl<S: EventSource> InteractiveListener<S> {
    pub fn new(
        source: S,
        api: SlackApi,
        bot_token: Secret<String>,
        channel_id: String,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Initializing);
        Self {
            source,
            api,
            bot_token,
            channel_id,
            completion,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Run until `cancel` fires or the source is exhausted.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(channel_id = %self.channel_id, "slack interactive listener started");
        self.state.send_replace(ListenerState::Listening);

        loop {
            let envelope = tokio::select! {
                () = cancel.cancelled() => break,
                next = self.source.next_envelope() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            self.state.send_replace(ListenerState::Processing);
            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.handle(envelope) => {},
            }
            self.state.send_replace(ListenerState::Listening);
        }

        self.source.close().await;
        self.state.send_replace(ListenerState::Closed);
        info!(channel_id = %self.channel_id, "slack interactive listener stopped");
    }

    async fn handle(&mut self, envelope: Envelope) {
        if let Some(id) = envelope.envelope_id.as_deref()
            && let Err(e) = self.source.ack(id).await
        {
            warn!(envelope_id = id, error = %e, "failed to acknowledge envelope");
        }

        if !envelope.is_interactive() {
            debug!(kind = %envelope.kind, "ignoring socket mode envelope");
            return;
        }
        let Some(prompt) = envelope.action_value() else {
            debug!("interaction without an action value");
            return;
        };

        let answer = match self.completion.complete(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                let err = kvnts_sinks::Error::completion(e);
                warn!(channel_id = %self.channel_id, error = %err, "assistant completion failed");
                format!("⚠ {err}")
            },
        };
        if answer.trim().is_empty() {
            debug!("assistant returned a blank answer, nothing to post");
            return;
        }

        let reply = blocks::assistant_reply(&self.channel_id, prompt, &answer);
        if let Err(e) = self.api.post_message(&self.bot_token, &reply).await {
            warn!(channel_id = %self.channel_id, error = %e, "failed to post assistant response");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        mockito::Matcher,
        serde_json::json,
        std::{collections::VecDeque, sync::Mutex},
    };

    type Log = Arc<Mutex<Vec<String>>>;

    struct FakeSource {
        envelopes: VecDeque<Envelope>,
        log: Log,
    }

    #[async_trait]
    impl EventSource for FakeSource {
        async fn next_envelope(&mut self) -> Option<Envelope> {
            self.envelopes.pop_front()
        }

        async fn ack(&mut self, envelope_id: &str) -> crate::Result<()> {
            self.log.lock().unwrap().push(format!("ack:{envelope_id}"));
            Ok(())
        }
    }

    struct FakeCompletion {
        answer: Result<String, &'static str>,
        log: Log,
    }

    #[async_trait]
    impl CompletionService for FakeCompletion {
        async fn complete(&self, prompt: &str) -> kvnts_assistant::Result<String> {
            self.log.lock().unwrap().push(format!("complete:{prompt}"));
            self.answer
                .clone()
                .map_err(|_| kvnts_assistant::Error::EmptyResponse)
        }
    }

    fn click(id: &str, value: &str) -> Envelope {
        serde_json::from_value(json!({
            "type": "interactive",
            "envelope_id": id,
            "payload": { "actions": [{ "name": "ask_assistant", "value": value }] },
        }))
        .unwrap()
    }

    fn listener(
        envelopes: Vec<Envelope>,
        answer: Result<String, &'static str>,
        api: SlackApi,
    ) -> (InteractiveListener<FakeSource>, Log) {
        let log = Log::default();
        let source = FakeSource {
            envelopes: envelopes.into(),
            log: Arc::clone(&log),
        };
        let completion = Arc::new(FakeCompletion {
            answer,
            log: Arc::clone(&log),
        });
        let listener = InteractiveListener::new(
            source,
            api,
            Secret::new("xoxb-test".into()),
            "C1".into(),
            completion,
        );
        (listener, log)
    }

    #[tokio::test]
    async fn acks_before_completion_and_posts_answer_once() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/chat.postMessage")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "channel": "C1" })),
                Matcher::Regex("Check resource limits".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"ts":"1.2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (listener, log) = listener(
            vec![click("e1", "why did my pod crash")],
            Ok("Check resource limits".into()),
            SlackApi::new(server.url()),
        );
        let state = listener.state();
        listener.run(CancellationToken::new()).await;

        assert_eq!(*log.lock().unwrap(), vec![
            "ack:e1".to_string(),
            "complete:why did my pod crash".to_string()
        ]);
        assert_eq!(*state.borrow(), ListenerState::Closed);
        post.assert_async().await;
    }

    #[tokio::test]
    async fn completion_failure_is_posted_as_warning() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/chat.postMessage")
            .match_body(Matcher::Regex("⚠".into()))
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"ts":"1.2"}"#)
            .expect(1)
            .create_async()
            .await;

        let (listener, _) = listener(
            vec![click("e1", "OOMKilled")],
            Err("down"),
            SlackApi::new(server.url()),
        );
        listener.run(CancellationToken::new()).await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn blank_answer_posts_nothing() {
        let mut server = mockito::Server::new_async().await;
        let post = server
            .mock("POST", "/chat.postMessage")
            .expect(0)
            .create_async()
            .await;

        let (listener, log) = listener(
            vec![click("e1", "OOMKilled")],
            Ok("   ".into()),
            SlackApi::new(server.url()),
        );
        listener.run(CancellationToken::new()).await;

        assert_eq!(log.lock().unwrap().len(), 2);
        post.assert_async().await;
    }

    #[tokio::test]
    async fn non_interactive_envelopes_are_only_acked() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "events_api",
            "envelope_id": "e9",
            "payload": {},
        }))
        .unwrap();
        let (listener, log) = listener(vec![envelope], Ok("unused".into()), SlackApi::default());
        listener.run(CancellationToken::new()).await;

        assert_eq!(*log.lock().unwrap(), vec!["ack:e9".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_stops_a_pending_listener() {
        struct PendingSource;

        #[async_trait]
        impl EventSource for PendingSource {
            async fn next_envelope(&mut self) -> Option<Envelope> {
                std::future::pending().await
            }

            async fn ack(&mut self, _envelope_id: &str) -> crate::Result<()> {
                Ok(())
            }
        }

        let completion = Arc::new(FakeCompletion {
            answer: Ok(String::new()),
            log: Log::default(),
        });
        let listener = InteractiveListener::new(
            PendingSource,
            SlackApi::default(),
            Secret::new("xoxb-test".into()),
            "C1".into(),
            completion,
        );
        let state = listener.state();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(*state.borrow(), ListenerState::Closed);
    }
}
