//! Line-delimited JSON protocol spoken with the client script
//!
//! Inbound messages arrive on stdin tagged by `kind`; outbound commands are
//! written to stdout tagged by `command`.

use serde::{Deserialize, Serialize};

use crate::error::CallRingResult;
use crate::model::{Channel, Guild, HostEvent, User};
use crate::popup::WindowId;
use crate::ring::RingStarted;

/// Messages the client script sends to this process
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Inbound {
    /// A dispatcher action forwarded verbatim
    Dispatch { event: HostEvent },
    /// The client plugin started; subscribe the ring tracker
    Start,
    /// The client plugin stopped; unsubscribe the ring tracker
    Stop,
    CurrentUser { user: User },
    User { user: User },
    Channel { channel: Channel },
    Guild { guild: Guild },
    #[serde(rename_all = "camelCase")]
    Presence { user_id: String, status: String },
    Focus { focused: bool },
    /// Popup responses, used when the host renders the popup itself
    Answer,
    Dismiss,
    AdjustHeight { delta: f64 },
    CallClosed { window: WindowId },
}

impl Inbound {
    /// Parse one stdin line. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> CallRingResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    }
}

/// Rounded height delta; fractional pixels from the page are rounded
pub fn height_delta(delta: f64) -> i32 {
    if delta.is_finite() {
        delta.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    } else {
        0
    }
}

/// Commands written back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostCommand {
    /// Join the call on a channel
    #[serde(rename_all = "camelCase")]
    Call { channel_id: String },
    /// Stop the ring on a channel without joining
    #[serde(rename_all = "camelCase")]
    StopRinging { channel_id: String },
    /// Bring the main client window to the front
    FocusMain,
    ShowCall { window: WindowId, data: RingStarted },
    ResizeCall { window: WindowId, width: u32, height: u32 },
    CloseCall { window: WindowId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dispatch_with_call_update() {
        let msg = Inbound::parse_line(
            r#"{"kind":"dispatch","event":{"type":"CALL_UPDATE","channelId":"c1","ongoingRings":{"u1":{}}}}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            Inbound::Dispatch { event: HostEvent::CallUpdate { channel_id, ongoing_rings } } => {
                assert_eq!(channel_id, "c1");
                assert!(ongoing_rings.unwrap().contains("u1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_unknown_dispatch_as_other() {
        let msg = Inbound::parse_line(r#"{"kind":"dispatch","event":{"type":"TYPING_START"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg, Inbound::Dispatch { event: HostEvent::Other });
    }

    #[test]
    fn parses_store_snapshots() {
        let msg = Inbound::parse_line(
            r#"{"kind":"user","user":{"id":"1","username":"clay","globalName":"Clay","avatar":null}}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            Inbound::User { user } => assert_eq!(user.display_name(), "Clay"),
            other => panic!("unexpected {:?}", other),
        }

        let msg = Inbound::parse_line(
            r#"{"kind":"channel","channel":{"id":"c1","guild_id":"g1","name":"general"}}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            Inbound::Channel { channel } => {
                assert_eq!(channel.guild(), Some("g1"));
                assert!(channel.recipients.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg = Inbound::parse_line(r#"{"kind":"presence","userId":"1","status":"dnd"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg, Inbound::Presence { user_id: "1".into(), status: "dnd".into() });
    }

    #[test]
    fn channel_with_null_recipients_is_cached() {
        let msg = Inbound::parse_line(
            r#"{"kind":"channel","channel":{"id":"c1","name":"general","guild_id":"g1","recipients":null}}"#,
        )
        .unwrap()
        .unwrap();
        match msg {
            Inbound::Channel { channel } => {
                assert_eq!(channel.name.as_deref(), Some("general"));
                assert!(channel.recipients.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn blank_and_malformed_lines() {
        assert!(Inbound::parse_line("   ").unwrap().is_none());
        assert!(Inbound::parse_line("{not json").is_err());
        assert!(Inbound::parse_line(r#"{"kind":"teleport"}"#).is_err());
    }

    #[test]
    fn height_delta_rounds() {
        assert_eq!(height_delta(12.4), 12);
        assert_eq!(height_delta(-3.6), -4);
        assert_eq!(height_delta(f64::NAN), 0);
    }

    #[test]
    fn commands_serialize_with_camel_case_tags() {
        let json = serde_json::to_string(&HostCommand::StopRinging { channel_id: "c1".into() })
            .unwrap();
        assert_eq!(json, r#"{"command":"stopRinging","channelId":"c1"}"#);

        let json = serde_json::to_string(&HostCommand::FocusMain).unwrap();
        assert_eq!(json, r#"{"command":"focusMain"}"#);

        let json = serde_json::to_string(&HostCommand::CloseCall { window: WindowId::new(3) })
            .unwrap();
        assert_eq!(json, r#"{"command":"closeCall","window":3}"#);
    }
}
