//! Session policy: whether an event is forwarded and which session tag rides along.

use crate::events::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag used when the event carries none (echo policy) and the default session id.
pub const DEFAULT_SESSION: &str = "1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    /// Forward everything as a bare string.
    None,
    /// Forward everything, tagged with the local session id.
    Tag,
    /// Forward only events whose session equals the local id (except `new-prompt`), tagged with the local id.
    #[default]
    Strict,
    /// Forward everything, tagged with the event's own session (or "1").
    Echo,
}

impl SessionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPolicy::None => "none",
            SessionPolicy::Tag => "tag",
            SessionPolicy::Strict => "strict",
            SessionPolicy::Echo => "echo",
        }
    }
}

impl fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SessionPolicy::None),
            "tag" => Ok(SessionPolicy::Tag),
            "strict" => Ok(SessionPolicy::Strict),
            "echo" => Ok(SessionPolicy::Echo),
            other => Err(format!(
                "unknown session policy {:?} (expected none, tag, strict or echo)",
                other
            )),
        }
    }
}

/// Outcome of applying the policy to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Drop,
    Bare,
    Tagged(String),
}

/// Exact string equality; an event without a session tag never matches.
pub fn session_matches(event_session: Option<&str>, local_session: &str) -> bool {
    event_session == Some(local_session)
}

pub fn evaluate(
    policy: SessionPolicy,
    kind: EventKind,
    event_session: Option<&str>,
    local_session: &str,
) -> Verdict {
    match policy {
        SessionPolicy::None => Verdict::Bare,
        SessionPolicy::Tag => Verdict::Tagged(local_session.to_string()),
        SessionPolicy::Strict => {
            // new-prompt is forwarded regardless of session.
            if kind == EventKind::NewPrompt || session_matches(event_session, local_session) {
                Verdict::Tagged(local_session.to_string())
            } else {
                Verdict::Drop
            }
        }
        SessionPolicy::Echo => {
            Verdict::Tagged(event_session.unwrap_or(DEFAULT_SESSION).to_string())
        }
    }
}
