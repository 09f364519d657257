//! Replay message protocol definitions
//!
//! All messages are newline-delimited JSON. Input records describe what
//! a host session observed; output records carry what the arbiter decided.

use serde::{Deserialize, Serialize};

use crate::events::{ArbiterEvent, PlaybackCommand};
use crate::session::{SessionInput, Utterance};

/// Session id used when a record does not name one
pub const DEFAULT_SESSION: &str = "default";

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

/// One line of replay input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Session the action applies to
    #[serde(default = "default_session")]
    pub session: String,

    #[serde(flatten)]
    pub action: Action,
}

/// Actions a host can replay into a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Transcript fragment
    Utterance {
        text: String,
        #[serde(default)]
        is_final: bool,
    },

    /// Agent playback started
    PlaybackStarted,

    /// Agent playback completed normally
    PlaybackFinished,

    /// Interrupting utterance turned out to be non-actionable
    RevisedToNonActionable,

    /// End the session
    Teardown,

    /// Pause the replay so timers can run
    Wait { ms: u64 },
}

impl Action {
    /// Convert into a session input; `Wait` is handled by the driver
    pub fn into_input(self) -> Option<SessionInput> {
        match self {
            Action::Utterance { text, is_final } => Some(Utterance::new(text, is_final).into()),
            Action::PlaybackStarted => Some(SessionInput::PlaybackStarted),
            Action::PlaybackFinished => Some(SessionInput::PlaybackFinished),
            Action::RevisedToNonActionable => Some(SessionInput::RevisedToNonActionable),
            Action::Teardown => Some(SessionInput::Teardown),
            Action::Wait { .. } => None,
        }
    }
}

/// One line of replay output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRecord {
    /// Playback command the host must execute
    Command {
        session: String,
        command: PlaybackCommand,
    },

    /// Observability event
    Event {
        session: String,
        event: ArbiterEvent,
    },
}

impl OutputRecord {
    pub fn session(&self) -> &str {
        match self {
            OutputRecord::Command { session, .. } | OutputRecord::Event { session, .. } => session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_deserialization() {
        let record: InputRecord =
            serde_json::from_str(r#"{"type":"utterance","text":"yeah","is_final":true}"#).unwrap();
        assert_eq!(record.session, DEFAULT_SESSION);
        assert_eq!(
            record.action,
            Action::Utterance {
                text: "yeah".to_string(),
                is_final: true,
            }
        );

        let record: InputRecord =
            serde_json::from_str(r#"{"type":"playback_started","session":"room-7"}"#).unwrap();
        assert_eq!(record.session, "room-7");
        assert_eq!(record.action, Action::PlaybackStarted);
    }

    #[test]
    fn test_is_final_defaults_false() {
        let record: InputRecord =
            serde_json::from_str(r#"{"type":"utterance","text":"wait"}"#).unwrap();
        assert!(matches!(record.action, Action::Utterance { is_final: false, .. }));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<InputRecord>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<InputRecord>(r#"{"type":"wait"}"#).is_err());
    }

    #[test]
    fn test_wait_has_no_input() {
        assert_eq!(Action::Wait { ms: 10 }.into_input(), None);
        assert_eq!(
            Action::Teardown.into_input(),
            Some(SessionInput::Teardown)
        );
    }

    #[test]
    fn test_output_serialization() {
        let record = OutputRecord::Command {
            session: "a".to_string(),
            command: PlaybackCommand::Resume,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"session":"a","command":"resume"}"#);

        let record = OutputRecord::Event {
            session: "a".to_string(),
            event: ArbiterEvent::ResumeIssued { generation: 3 },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""event":{"type":"resume_issued","generation":3}"#));
    }
}
