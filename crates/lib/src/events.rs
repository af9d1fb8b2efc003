//! Inbound event names and payload shapes emitted by the prompt server.
//!
//! Parsing never fails: missing or mistyped fields become empty strings, and a
//! payload that is not an object at all yields the all-default event.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Events the relay binds. Names are the server's wire names, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    NewPrompt,
    TextUpdate,
    LoadPrompt,
    PromptDeleted,
    RotatePrompt,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::NewPrompt,
        EventKind::TextUpdate,
        EventKind::LoadPrompt,
        EventKind::PromptDeleted,
        EventKind::RotatePrompt,
    ];

    /// Server events that carry a payload to forward; `connect`/`disconnect` are lifecycle only.
    pub const FORWARDED: [EventKind; 5] = [
        EventKind::NewPrompt,
        EventKind::TextUpdate,
        EventKind::LoadPrompt,
        EventKind::PromptDeleted,
        EventKind::RotatePrompt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::NewPrompt => "new-prompt",
            EventKind::TextUpdate => "text-update",
            EventKind::LoadPrompt => "load-prompt",
            EventKind::PromptDeleted => "prompt-deleted",
            EventKind::RotatePrompt => "rotate-prompt",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// `new-prompt` and `load-prompt`: a stored prompt document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEvent {
    #[serde(default, rename = "_id", alias = "id", deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_session")]
    pub session: Option<String>,
}

/// `text-update`: live editor contents. Older servers emit the bare string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextUpdateEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_session")]
    pub session: Option<String>,
}

/// `rotate-prompt`: gallery mode advanced to another prompt.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationEvent {
    #[serde(default)]
    pub prompt_index: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prompt_text: String,
    #[serde(default, deserialize_with = "lenient_session")]
    pub session: Option<String>,
}

/// `prompt-deleted`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeletionEvent {
    #[serde(default, alias = "_id", deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_session")]
    pub session: Option<String>,
}

/// Parse an event payload, degrading to the default event when the shape is wrong.
pub fn parse<T: DeserializeOwned + Default>(data: &Value) -> T {
    serde_json::from_value(data.clone()).unwrap_or_else(|e| {
        log::debug!("event payload did not parse ({}), using defaults: {}", e, data);
        T::default()
    })
}

impl TextUpdateEvent {
    pub fn from_value(data: &Value) -> Self {
        match data {
            Value::String(text) => Self {
                text: text.clone(),
                session: None,
            },
            other => parse(other),
        }
    }
}

/// Display form of a JSON value: strings unquoted, null empty, anything else as JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(deserializer)?))
}

/// Only string tags count as a session; anything else is treated as absent.
fn lenient_session<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("gallery-mode"), None);
    }

    #[test]
    fn prompt_event_reads_mongo_id_and_camel_case() {
        let ev: PromptEvent = parse(&json!({
            "_id": "65f0c0ffee",
            "content": "a forest at dawn",
            "createdAt": "2024-03-12T10:00:00.000Z",
            "session": "2"
        }));
        assert_eq!(ev.id, "65f0c0ffee");
        assert_eq!(ev.content, "a forest at dawn");
        assert_eq!(ev.created_at, "2024-03-12T10:00:00.000Z");
        assert_eq!(ev.session.as_deref(), Some("2"));
    }

    #[test]
    fn missing_and_mistyped_fields_degrade_to_empty() {
        let ev: PromptEvent = parse(&json!({ "_id": "x" }));
        assert_eq!(ev.content, "");
        assert_eq!(ev.session, None);

        let ev: PromptEvent = parse(&json!({ "content": null, "session": 2 }));
        assert_eq!(ev.content, "");
        assert_eq!(ev.session, None);

        let ev: RotationEvent = parse(&json!({ "promptText": 42 }));
        assert_eq!(ev.prompt_text, "42");

        let ev: DeletionEvent = parse(&json!("not an object"));
        assert_eq!(ev, DeletionEvent::default());
    }

    #[test]
    fn text_update_accepts_bare_string() {
        let ev = TextUpdateEvent::from_value(&json!("typing..."));
        assert_eq!(ev.text, "typing...");
        assert_eq!(ev.session, None);

        let ev = TextUpdateEvent::from_value(&json!({ "text": "Hi", "session": "3" }));
        assert_eq!(ev.text, "Hi");
        assert_eq!(ev.session.as_deref(), Some("3"));
    }
}
