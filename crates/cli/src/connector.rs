use std::sync::Arc;

use {
    async_trait::async_trait,
    kvnts_assistant::CompletionService,
    kvnts_config::SinkConfig,
    kvnts_sinks::{BuiltSink, SinkConnector, SinkIdentity},
    tokio_util::sync::CancellationToken,
};

/// Connects real Slack, Mattermost and Teams clients.
///
/// The completion service is shared by every Slack sink; without one, Slack
/// messages carry no assistant button and no listener is started.
pub struct LiveConnector {
    completion: Option<Arc<dyn CompletionService>>,
}

impl LiveConnector {
    pub fn new(completion: Option<Arc<dyn CompletionService>>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl SinkConnector for LiveConnector {
    async fn connect(
        &self,
        identity: &SinkIdentity,
        config: &SinkConfig,
        cancel: CancellationToken,
    ) -> kvnts_sinks::Result<BuiltSink> {
        let built = match config {
            SinkConfig::Slack(slack) => {
                kvnts_slack::connect(identity, slack, self.completion.clone(), cancel)
            },
            SinkConfig::Mattermost(mattermost) => kvnts_mattermost::connect(identity, mattermost),
            SinkConfig::Teams(teams) => kvnts_msteams::connect(identity, teams),
        };
        Ok(built)
    }
}
