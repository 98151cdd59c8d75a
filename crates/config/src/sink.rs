//! Typed sink configuration.
//!
//! A configured sink is a [`SinkEntry`] as read from the config file. Its
//! `type` string is resolved into a [`SinkType`] and the matching section into
//! a [`SinkConfig`], a closed enum with one variant per supported channel.

use std::{fmt, str::FromStr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

const SLACK_BOT_TOKEN_PREFIX: &str = "xoxb-";
const SLACK_APP_TOKEN_PREFIX: &str = "xapp-";

/// Default pause after each Slack delivery (Slack tier-3 rate limit).
pub const DEFAULT_SLACK_RATE_LIMIT_MS: u64 = 1000;

/// Supported channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    Slack,
    Mattermost,
    MicrosoftTeams,
}

impl SinkType {
    pub const ALL: [Self; 3] = [Self::Slack, Self::Mattermost, Self::MicrosoftTeams];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Mattermost => "mattermost",
            Self::MicrosoftTeams => "microsoft_teams",
        }
    }

    /// Name of the config section carrying this type's settings.
    pub fn section(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Mattermost => "mattermost",
            Self::MicrosoftTeams => "teams",
        }
    }
}

impl fmt::Display for SinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::unsupported(s))
    }
}

// ── Slack ───────────────────────────────────────────────────────────────────

/// Credentials for a Slack app using Socket Mode.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-...`).
    #[serde(alias = "botToken", serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,

    /// Channel the notifications are posted to.
    #[serde(alias = "channelID")]
    pub channel_id: String,

    /// App-level token with `connections:write` (`xapp-...`).
    #[serde(alias = "appLevelToken", serialize_with = "serialize_secret")]
    pub app_level_token: Secret<String>,

    /// Log raw Slack API traffic.
    pub debug: bool,

    /// Pause after each delivery, in milliseconds.
    pub rate_limit_ms: u64,
}

impl SlackConfig {
    pub fn validate(&self) -> Result<()> {
        if !self
            .bot_token
            .expose_secret()
            .starts_with(SLACK_BOT_TOKEN_PREFIX)
        {
            return Err(Error::invalid(
                "slack.bot_token",
                format!("no valid bot token (expected prefix {SLACK_BOT_TOKEN_PREFIX})"),
            ));
        }
        if !self
            .app_level_token
            .expose_secret()
            .starts_with(SLACK_APP_TOKEN_PREFIX)
        {
            return Err(Error::invalid(
                "slack.app_level_token",
                format!("no valid app level token (expected prefix {SLACK_APP_TOKEN_PREFIX})"),
            ));
        }
        if self.channel_id.trim().is_empty() {
            return Err(Error::invalid("slack.channel_id", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: Secret::new(String::new()),
            channel_id: String::new(),
            app_level_token: Secret::new(String::new()),
            debug: false,
            rate_limit_ms: DEFAULT_SLACK_RATE_LIMIT_MS,
        }
    }
}

impl PartialEq for SlackConfig {
    fn eq(&self, other: &Self) -> bool {
        self.bot_token.expose_secret() == other.bot_token.expose_secret()
            && self.channel_id == other.channel_id
            && self.app_level_token.expose_secret() == other.app_level_token.expose_secret()
            && self.debug == other.debug
            && self.rate_limit_ms == other.rate_limit_ms
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("app_level_token", &"[REDACTED]")
            .field("debug", &self.debug)
            .field("rate_limit_ms", &self.rate_limit_ms)
            .finish()
    }
}

// ── Mattermost ──────────────────────────────────────────────────────────────

/// Credentials for posting through the Mattermost REST API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MattermostConfig {
    /// Server base URL, e.g. `https://mm.example.com`.
    pub url: String,

    /// Bot account access token.
    #[serde(alias = "botToken", serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,

    #[serde(alias = "channelID")]
    pub channel_id: String,

    pub debug: bool,
}

impl MattermostConfig {
    pub fn validate(&self) -> Result<()> {
        validate_http_url("mattermost.url", &self.url)?;
        if self.bot_token.expose_secret().trim().is_empty() {
            return Err(Error::invalid("mattermost.bot_token", "must not be empty"));
        }
        if self.channel_id.trim().is_empty() {
            return Err(Error::invalid("mattermost.channel_id", "must not be empty"));
        }
        Ok(())
    }
}

impl Default for MattermostConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            bot_token: Secret::new(String::new()),
            channel_id: String::new(),
            debug: false,
        }
    }
}

impl PartialEq for MattermostConfig {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
            && self.bot_token.expose_secret() == other.bot_token.expose_secret()
            && self.channel_id == other.channel_id
            && self.debug == other.debug
    }
}

impl fmt::Debug for MattermostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MattermostConfig")
            .field("url", &self.url)
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("debug", &self.debug)
            .finish()
    }
}

// ── Microsoft Teams ─────────────────────────────────────────────────────────

/// Incoming-webhook delivery to a Teams channel.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// The webhook URL embeds its own credential, so it is kept secret.
    #[serde(alias = "webhookURL", serialize_with = "serialize_secret")]
    pub webhook_url: Secret<String>,

    pub debug: bool,
}

impl TeamsConfig {
    pub fn validate(&self) -> Result<()> {
        validate_http_url("teams.webhook_url", self.webhook_url.expose_secret())
    }
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            webhook_url: Secret::new(String::new()),
            debug: false,
        }
    }
}

impl PartialEq for TeamsConfig {
    fn eq(&self, other: &Self) -> bool {
        self.webhook_url.expose_secret() == other.webhook_url.expose_secret()
            && self.debug == other.debug
    }
}

impl fmt::Debug for TeamsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeamsConfig")
            .field("webhook_url", &"[REDACTED]")
            .field("debug", &self.debug)
            .finish()
    }
}

// ── Closed configuration enum ───────────────────────────────────────────────

/// Configuration of one sink, one variant per [`SinkType`].
///
/// Equality is deep value equality, secrets included: a cached client is
/// reused only when every field of its configuration is unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
    Slack(SlackConfig),
    Mattermost(MattermostConfig),
    Teams(TeamsConfig),
}

impl SinkConfig {
    pub fn sink_type(&self) -> SinkType {
        match self {
            Self::Slack(_) => SinkType::Slack,
            Self::Mattermost(_) => SinkType::Mattermost,
            Self::Teams(_) => SinkType::MicrosoftTeams,
        }
    }

    /// Channel-specific credential checks, run before any client is built.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Slack(cfg) => cfg.validate(),
            Self::Mattermost(cfg) => cfg.validate(),
            Self::Teams(cfg) => cfg.validate(),
        }
    }
}

/// One configured sink as it appears under `[[sinks]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkEntry {
    pub namespace: String,
    pub name: String,

    /// One of `slack`, `mattermost`, `microsoft_teams`. Kept as a string so
    /// an unknown type fails only this entry, not the whole file.
    #[serde(rename = "type")]
    pub sink_type: String,

    /// Event reasons never forwarded to this sink.
    #[serde(alias = "excludedReasons")]
    pub excluded_reasons: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mattermost: Option<MattermostConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<TeamsConfig>,
}

impl Default for SinkEntry {
    fn default() -> Self {
        Self {
            namespace: "default".into(),
            name: String::new(),
            sink_type: SinkType::Slack.as_str().into(),
            excluded_reasons: Vec::new(),
            slack: None,
            mattermost: None,
            teams: None,
        }
    }
}

impl SinkEntry {
    pub fn excludes(&self, reason: &str) -> bool {
        self.excluded_reasons.iter().any(|r| r == reason)
    }

    /// Resolve the entry's type string and pick the matching section.
    pub fn sink_config(&self) -> Result<SinkConfig> {
        let sink_type: SinkType = self.sink_type.parse()?;
        let missing = || Error::MissingSection {
            sink_type,
            section: sink_type.section(),
        };
        let config = match sink_type {
            SinkType::Slack => SinkConfig::Slack(self.slack.clone().ok_or_else(missing)?),
            SinkType::Mattermost => {
                SinkConfig::Mattermost(self.mattermost.clone().ok_or_else(missing)?)
            },
            SinkType::MicrosoftTeams => SinkConfig::Teams(self.teams.clone().ok_or_else(missing)?),
        };
        Ok(config)
    }
}

fn validate_http_url(field: &'static str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| Error::invalid(field, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::invalid(
            field,
            format!("unsupported URL scheme {other:?}"),
        )),
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    pub(crate) fn slack(bot: &str, app: &str) -> SlackConfig {
        SlackConfig {
            bot_token: Secret::new(bot.into()),
            channel_id: "C0123".into(),
            app_level_token: Secret::new(app.into()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("slack", SinkType::Slack)]
    #[case("mattermost", SinkType::Mattermost)]
    #[case("microsoft_teams", SinkType::MicrosoftTeams)]
    fn parses_known_sink_types(#[case] raw: &str, #[case] expected: SinkType) {
        assert_eq!(raw.parse::<SinkType>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("discord")]
    #[case("Slack")]
    #[case("")]
    fn rejects_unknown_sink_types(#[case] raw: &str) {
        let err = raw.parse::<SinkType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedSinkType { .. }));
    }

    #[rstest]
    #[case("xoxb-1", "xapp-1", None)]
    #[case("xoxp-1", "xapp-1", Some("slack.bot_token"))]
    #[case("", "xapp-1", Some("slack.bot_token"))]
    #[case("xoxb-1", "xoxb-1", Some("slack.app_level_token"))]
    fn slack_token_prefixes(
        #[case] bot: &str,
        #[case] app: &str,
        #[case] failing_field: Option<&str>,
    ) {
        match (slack(bot, app).validate(), failing_field) {
            (Ok(()), None) => {},
            (Err(Error::Invalid { field, .. }), Some(expected)) => assert_eq!(field, expected),
            (other, expected) => panic!("unexpected {other:?} for {expected:?}"),
        }
    }

    #[test]
    fn slack_requires_channel() {
        let mut cfg = slack("xoxb-1", "xapp-1");
        cfg.channel_id = " ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn equality_covers_secrets() {
        let a = SinkConfig::Slack(slack("xoxb-1", "xapp-1"));
        let b = SinkConfig::Slack(slack("xoxb-1", "xapp-1"));
        let c = SinkConfig::Slack(slack("xoxb-2", "xapp-1"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", slack("xoxb-secret", "xapp-secret"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn teams_webhook_must_be_http() {
        let cfg = TeamsConfig {
            webhook_url: Secret::new("ftp://example.com/hook".into()),
            debug: false,
        };
        assert!(cfg.validate().is_err());
        let cfg = TeamsConfig {
            webhook_url: Secret::new("https://example.webhook.office.com/x".into()),
            debug: false,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn mattermost_requires_url_token_and_channel() {
        let mut cfg = MattermostConfig {
            url: "https://mm.example.com".into(),
            bot_token: Secret::new("tok".into()),
            channel_id: "town-square".into(),
            debug: false,
        };
        assert!(cfg.validate().is_ok());
        cfg.url = "mm.example.com".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let entry: SinkEntry = toml::from_str(
            r#"
            name = "ops"
            type = "mattermost"
            [mattermost]
            url = "https://mm.example.com"
            [teams]
            debug = true
            "#,
        )
        .unwrap();

        let mattermost = entry.mattermost.unwrap();
        assert_eq!(mattermost, MattermostConfig {
            url: "https://mm.example.com".into(),
            ..MattermostConfig::default()
        });
        assert!(mattermost.bot_token.expose_secret().is_empty());
        assert!(mattermost.validate().is_err());

        let teams = entry.teams.unwrap();
        assert!(teams.debug);
        assert!(teams.webhook_url.expose_secret().is_empty());
        assert!(TeamsConfig::default().validate().is_err());
    }

    #[test]
    fn entry_resolves_matching_section() {
        let entry = SinkEntry {
            name: "ops".into(),
            slack: Some(slack("xoxb-1", "xapp-1")),
            ..Default::default()
        };
        assert_eq!(entry.sink_config().unwrap().sink_type(), SinkType::Slack);
    }

    #[test]
    fn entry_without_section_is_rejected() {
        let entry = SinkEntry {
            name: "ops".into(),
            sink_type: "mattermost".into(),
            slack: Some(slack("xoxb-1", "xapp-1")),
            ..Default::default()
        };
        assert!(matches!(
            entry.sink_config(),
            Err(Error::MissingSection {
                sink_type: SinkType::Mattermost,
                ..
            })
        ));
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let entry: SinkEntry = serde_json::from_value(serde_json::json!({
            "name": "ops",
            "type": "slack",
            "excludedReasons": ["BackOff"],
            "slack": {
                "botToken": "xoxb-1",
                "channelID": "C1",
                "appLevelToken": "xapp-1"
            }
        }))
        .unwrap();
        assert!(entry.excludes("BackOff"));
        let SinkConfig::Slack(cfg) = entry.sink_config().unwrap() else {
            panic!("expected slack config");
        };
        assert_eq!(cfg.channel_id, "C1");
        assert_eq!(cfg.rate_limit_ms, DEFAULT_SLACK_RATE_LIMIT_MS);
    }
}
