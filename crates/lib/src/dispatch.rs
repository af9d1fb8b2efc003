//! Event dispatcher: name -> handler table, session policy, and forwarding.
//!
//! Each handler logs the event and extracts the text to forward plus the event's
//! session tag. Lifecycle events (`connect`, `disconnect`) only log.

use crate::events::{self, DeletionEvent, EventKind, PromptEvent, RotationEvent, TextUpdateEvent};
use crate::filter::{self, SessionPolicy, Verdict};
use crate::forward::{CommandSink, OutboundCommand, Payload};
use serde_json::Value;
use std::collections::HashMap;

/// What a handler pulls out of an event for forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub session: Option<String>,
}

type Handler = fn(&Value) -> Option<Extracted>;

#[derive(Clone, Copy)]
struct Binding {
    kind: EventKind,
    handler: Handler,
}

pub struct Dispatcher {
    bindings: HashMap<&'static str, Binding>,
    policy: SessionPolicy,
    session_id: String,
    address: String,
}

impl Dispatcher {
    pub fn new(
        policy: SessionPolicy,
        session_id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        let mut bindings = HashMap::new();
        for kind in EventKind::ALL {
            bindings.insert(
                kind.name(),
                Binding {
                    kind,
                    handler: handler_for(kind),
                },
            );
        }
        Self {
            bindings,
            policy,
            session_id: session_id.into(),
            address: address.into(),
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run the handler for `name` and apply the session policy. `None` means nothing is sent.
    pub fn command_for(&self, name: &str, data: &Value) -> Option<OutboundCommand> {
        let Some(binding) = self.bindings.get(name) else {
            log::debug!("ignoring unbound event {}: {}", name, data);
            return None;
        };
        let extracted = (binding.handler)(data)?;
        let payload = match filter::evaluate(
            self.policy,
            binding.kind,
            extracted.session.as_deref(),
            &self.session_id,
        ) {
            Verdict::Drop => {
                log::info!(
                    "skipping {}: session {:?} is not {:?}",
                    name,
                    extracted.session,
                    self.session_id
                );
                return None;
            }
            Verdict::Bare => Payload::Bare(extracted.text),
            Verdict::Tagged(session) => Payload::Tagged {
                text: extracted.text,
                session,
            },
        };
        Some(OutboundCommand::new(self.address.clone(), payload))
    }

    /// Handle one inbound event and send the resulting command, if any.
    /// Send failures are logged; the next event is handled regardless.
    pub async fn dispatch(&self, name: &str, data: &Value, sink: &dyn CommandSink) {
        let Some(command) = self.command_for(name, data) else {
            return;
        };
        log::debug!("forwarding {} -> {:?}", name, command);
        if let Err(e) = sink.send(&command).await {
            log::warn!("dropping {} command: {}", name, e);
        }
    }
}

fn handler_for(kind: EventKind) -> Handler {
    match kind {
        EventKind::Connect => on_connect,
        EventKind::Disconnect => on_disconnect,
        EventKind::NewPrompt => on_new_prompt,
        EventKind::TextUpdate => on_text_update,
        EventKind::LoadPrompt => on_load_prompt,
        EventKind::PromptDeleted => on_prompt_deleted,
        EventKind::RotatePrompt => on_rotate_prompt,
    }
}

fn on_connect(_: &Value) -> Option<Extracted> {
    log::info!("connected to server");
    None
}

fn on_disconnect(_: &Value) -> Option<Extracted> {
    log::info!("disconnected from server");
    None
}

fn on_new_prompt(data: &Value) -> Option<Extracted> {
    let ev: PromptEvent = events::parse(data);
    log::info!(
        "new prompt: id={} content={:?} createdAt={} session={}",
        ev.id,
        ev.content,
        ev.created_at,
        ev.session.as_deref().unwrap_or("-")
    );
    Some(Extracted {
        text: ev.content,
        session: ev.session,
    })
}

fn on_text_update(data: &Value) -> Option<Extracted> {
    let ev = TextUpdateEvent::from_value(data);
    log::info!("text update: {}", data);
    Some(Extracted {
        text: ev.text,
        session: ev.session,
    })
}

fn on_load_prompt(data: &Value) -> Option<Extracted> {
    let ev: PromptEvent = events::parse(data);
    log::info!("prompt selected: id={} content={:?}", ev.id, ev.content);
    Some(Extracted {
        text: ev.content,
        session: ev.session,
    })
}

/// Deletion always forwards an empty string: the listener clears its display.
fn on_prompt_deleted(data: &Value) -> Option<Extracted> {
    let ev: DeletionEvent = events::parse(data);
    log::info!("prompt deleted: id={}", ev.id);
    Some(Extracted {
        text: String::new(),
        session: ev.session,
    })
}

fn on_rotate_prompt(data: &Value) -> Option<Extracted> {
    let ev: RotationEvent = events::parse(data);
    log::info!(
        "prompt rotation: index={} text={:?} session={}",
        events::value_to_string(&ev.prompt_index),
        ev.prompt_text,
        ev.session.as_deref().unwrap_or("-")
    );
    Some(Extracted {
        text: ev.prompt_text,
        session: ev.session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::ForwardError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutboundCommand>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<OutboundCommand> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandSink for Recorder {
        async fn send(&self, command: &OutboundCommand) -> Result<(), ForwardError> {
            self.sent.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl CommandSink for Failing {
        async fn send(&self, _: &OutboundCommand) -> Result<(), ForwardError> {
            Err(ForwardError::Send(std::io::Error::from(
                std::io::ErrorKind::WouldBlock,
            )))
        }
    }

    fn tagged(text: &str, session: &str) -> Payload {
        Payload::Tagged {
            text: text.into(),
            session: session.into(),
        }
    }

    #[test]
    fn strict_text_update_matches_session() {
        let d = Dispatcher::new(SessionPolicy::Strict, "2", "/mensaje");
        let out = d
            .command_for("text-update", &json!({"text": "Hi", "session": "2"}))
            .unwrap();
        assert_eq!(out.address, "/mensaje");
        assert_eq!(out.payload, tagged("Hi", "2"));
        assert_eq!(
            d.command_for("text-update", &json!({"text": "Hi", "session": "3"})),
            None
        );
    }

    #[test]
    fn none_policy_rotation_is_bare() {
        let d = Dispatcher::new(SessionPolicy::None, "1", "/mensaje");
        let out = d
            .command_for("rotate-prompt", &json!({"promptIndex": 0, "promptText": "Next"}))
            .unwrap();
        assert_eq!(out.payload, Payload::Bare("Next".into()));
    }

    #[test]
    fn strict_new_prompt_ignores_session_mismatch() {
        let d = Dispatcher::new(SessionPolicy::Strict, "1", "/mensaje");
        let out = d
            .command_for("new-prompt", &json!({"content": "X", "session": "9"}))
            .unwrap();
        assert_eq!(out.payload, tagged("X", "1"));
    }

    #[test]
    fn missing_content_forwards_empty_string() {
        let d = Dispatcher::new(SessionPolicy::None, "1", "/mensaje");
        for name in ["new-prompt", "load-prompt", "text-update", "rotate-prompt"] {
            let out = d.command_for(name, &json!({"_id": "abc"})).unwrap();
            assert_eq!(out.payload, Payload::Bare(String::new()), "event {}", name);
        }
        let out = d.command_for("load-prompt", &Value::Null).unwrap();
        assert_eq!(out.payload, Payload::Bare(String::new()));
    }

    #[test]
    fn deletion_always_clears() {
        let d = Dispatcher::new(SessionPolicy::Tag, "5", "/mensaje");
        let out = d
            .command_for(
                "prompt-deleted",
                &json!({"id": "abc", "content": "ignored", "session": "8"}),
            )
            .unwrap();
        assert_eq!(out.payload, tagged("", "5"));
    }

    #[test]
    fn tag_policy_pairs_every_payload_with_local_session() {
        let d = Dispatcher::new(SessionPolicy::Tag, "4", "/mensaje");
        let events = [
            ("new-prompt", json!({"content": "a", "session": "1"})),
            ("text-update", json!({"text": "b"})),
            ("load-prompt", json!({"content": "c", "session": "9"})),
            ("rotate-prompt", json!({"promptText": "d", "session": "4"})),
        ];
        for (name, data) in events {
            match d.command_for(name, &data).map(|c| c.payload) {
                Some(Payload::Tagged { session, .. }) => assert_eq!(session, "4"),
                other => panic!("{} produced {:?}", name, other),
            }
        }
    }

    #[test]
    fn echo_policy_forwards_event_session_or_default() {
        let d = Dispatcher::new(SessionPolicy::Echo, "7", "/mensaje");
        let out = d
            .command_for("text-update", &json!({"text": "Hi", "session": "3"}))
            .unwrap();
        assert_eq!(out.payload, tagged("Hi", "3"));
        let out = d.command_for("load-prompt", &json!({"content": "c"})).unwrap();
        assert_eq!(out.payload, tagged("c", "1"));
        // Non-string session tags are treated as absent.
        let out = d
            .command_for("rotate-prompt", &json!({"promptText": "r", "session": 4}))
            .unwrap();
        assert_eq!(out.payload, tagged("r", "1"));
    }

    #[tokio::test]
    async fn lifecycle_and_unknown_events_send_nothing() {
        let d = Dispatcher::new(SessionPolicy::None, "1", "/mensaje");
        let sink = Recorder::default();
        d.dispatch("connect", &Value::Null, &sink).await;
        d.dispatch("disconnect", &Value::Null, &sink).await;
        d.dispatch("gallery-mode", &json!({"isActive": true}), &sink)
            .await;
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn duplicate_events_are_forwarded_twice() {
        let d = Dispatcher::new(SessionPolicy::Strict, "2", "/mensaje");
        let sink = Recorder::default();
        let data = json!({"text": "Hi", "session": "2"});
        d.dispatch("text-update", &data, &sink).await;
        d.dispatch("text-update", &data, &sink).await;
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn send_failure_does_not_panic() {
        let d = Dispatcher::new(SessionPolicy::None, "1", "/mensaje");
        d.dispatch("text-update", &json!({"text": "Hi"}), &Failing)
            .await;
    }
}
