use {kvnts_common::Payload, serde::Serialize};

const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const ADAPTIVE_CARD_VERSION: &str = "1.4";

/// Only the tail of the log excerpt is embedded; webhooks cap payloads at
/// about 28 KB.
pub const MAX_LOG_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub attachments: Vec<CardAttachment>,
}

#[derive(Debug, Serialize)]
pub struct CardAttachment {
    #[serde(rename = "contentType")]
    pub content_type: &'static str,
    pub content: AdaptiveCard,
}

#[derive(Debug, Serialize)]
pub struct AdaptiveCard {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    #[serde(rename = "type")]
    pub card_type: &'static str,
    pub version: &'static str,
    pub body: Vec<Element>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Element {
    TextBlock {
        text: String,
        wrap: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<&'static str>,
        #[serde(rename = "fontType", skip_serializing_if = "Option::is_none")]
        font_type: Option<&'static str>,
    },
    FactSet {
        facts: Vec<Fact>,
    },
}

#[derive(Debug, Serialize)]
pub struct Fact {
    pub title: String,
    pub value: String,
}

impl Element {
    fn text(text: String) -> Self {
        Self::TextBlock {
            text,
            wrap: true,
            weight: None,
            font_type: None,
        }
    }

    fn heading(text: String) -> Self {
        Self::TextBlock {
            text,
            wrap: true,
            weight: Some("Bolder"),
            font_type: None,
        }
    }

    fn monospace(text: String) -> Self {
        Self::TextBlock {
            text,
            wrap: true,
            weight: None,
            font_type: Some("Monospace"),
        }
    }
}

fn fact(title: &str, value: impl Into<String>) -> Fact {
    Fact {
        title: title.to_string(),
        value: value.into(),
    }
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Card for one cluster event.
pub fn event_card(payload: &Payload) -> WebhookMessage {
    let mut body = vec![
        Element::heading(format!(
            "🔔 Cluster: {}, Type: {}, Reason: {}, Kind: {}",
            payload.cluster_name(),
            payload.level(),
            payload.reason(),
            payload.kind(),
        )),
        Element::text(format!("🚦 {}", payload.note())),
        Element::FactSet {
            facts: vec![
                fact("Namespace", payload.namespace()),
                fact("Pod", payload.pod()),
                fact("First seen", payload.first_seen().to_rfc3339()),
                fact("Last seen", payload.last_seen().to_rfc3339()),
            ],
        },
    ];
    if let Some(logs) = payload.log_excerpt() {
        body.push(Element::text(format!("📄 {}", payload.log_file_name())));
        body.push(Element::monospace(tail(logs, MAX_LOG_CHARS).to_string()));
    }

    WebhookMessage {
        message_type: "message",
        attachments: vec![CardAttachment {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE,
            content: AdaptiveCard {
                schema: ADAPTIVE_CARD_SCHEMA,
                card_type: "AdaptiveCard",
                version: ADAPTIVE_CARD_VERSION,
                body,
            },
        }],
    }
}
