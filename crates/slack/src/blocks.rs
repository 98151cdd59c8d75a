//! Block Kit composition for event notifications and assistant replies.

use {
    kvnts_common::Payload,
    serde_json::{Value, json},
};

use crate::api::ChatMessage;

/// `callback_id` and action `name` carried by the ask-assistant button.
pub const ASK_ASSISTANT_ACTION: &str = "ask_assistant";

/// Slack caps button values at 2000 characters.
const MAX_BUTTON_VALUE: usize = 2000;
/// Slack caps section text at 3000 characters.
const MAX_SECTION_TEXT: usize = 3000;

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": truncate(text, MAX_SECTION_TEXT) },
    })
}

fn divider() -> Value {
    json!({ "type": "divider" })
}

/// Notification for one cluster event.
///
/// With `interactive` set, a legacy attachment carries a button whose value
/// is the event note; clicking it asks the assistant about the event.
pub fn event_message(channel_id: &str, payload: &Payload, interactive: bool) -> ChatMessage {
    let header = format!(
        "🔔 Cluster: *{}*, Type: *{}*, Reason: *{}*, Kind: *{}*\n\n🚦 *Alert:* {}",
        payload.cluster_name(),
        payload.level(),
        payload.reason(),
        payload.kind(),
        payload.note(),
    );
    let location = format!(
        "• *namespace:* {}\n• *pod:* {}",
        payload.namespace(),
        payload.pod()
    );
    let seen = format!(
        "🔛 *First seen:* {}\n🔚 *Last seen:* {}",
        payload.first_seen().to_rfc3339(),
        payload.last_seen().to_rfc3339(),
    );

    let attachments = if interactive {
        vec![json!({
            "pretext": "🆘 *Ask the assistant to analyse the event and suggest a course of action:*",
            "fallback": "Your client does not support interactive messages",
            "callback_id": ASK_ASSISTANT_ACTION,
            "color": "#3AA3E3",
            "actions": [{
                "name": ASK_ASSISTANT_ACTION,
                "text": "💬 Ask the assistant for help",
                "type": "button",
                "style": "primary",
                "value": truncate(payload.note(), MAX_BUTTON_VALUE),
            }],
        })]
    } else {
        Vec::new()
    };

    ChatMessage {
        channel: channel_id.to_string(),
        text: format!(
            "{} {} on {}/{}",
            payload.level(),
            payload.reason(),
            payload.namespace(),
            payload.pod()
        ),
        blocks: vec![divider(), section(&header), section(&location), section(&seen)],
        attachments,
    }
}

/// Follow-up message carrying the assistant's answer to `prompt`.
pub fn assistant_reply(channel_id: &str, prompt: &str, answer: &str) -> ChatMessage {
    let header = format!("🤖 *Assistant response for the event:*\n\n🚦 {prompt} :");
    ChatMessage {
        channel: channel_id.to_string(),
        text: truncate(answer, MAX_SECTION_TEXT).to_string(),
        blocks: vec![section(&header), section(answer), divider()],
        attachments: Vec::new(),
    }
}
