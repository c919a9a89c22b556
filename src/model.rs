//! Host data model
//!
//! Mirrors the subset of the web client's user, channel and guild records
//! that the ring tracker reads, plus the dispatcher events it subscribes to.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A user record as reported by the client's user store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl User {
    /// Name shown in the UI: global name when set, otherwise the username
    pub fn display_name(&self) -> &str {
        match self.global_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    /// Index into the client's five default avatars
    pub fn default_avatar_index(&self) -> u64 {
        discriminator_index(self.discriminator.as_deref())
    }
}

/// `discriminator mod 5`, with a missing or unparseable discriminator counted as 0
pub fn discriminator_index(discriminator: Option<&str>) -> u64 {
    discriminator
        .and_then(|d| d.trim().parse::<u64>().ok())
        .unwrap_or(0)
        % 5
}

/// A channel record. Field names follow the client's store, which keeps
/// `guild_id` in snake case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// The client sends `null` for channels without recipients
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recipients: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Channel {
    pub fn guild(&self) -> Option<&str> {
        self.guild_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A guild record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Who is being rung on a channel right now.
///
/// Values are opaque: only key presence is ever inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RingSnapshot(BTreeMap<String, serde_json::Value>);

impl RingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, ringer_id: &str) -> bool {
        self.0.contains_key(ringer_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>> FromIterator<K> for RingSnapshot {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|id| (id.into(), serde_json::Value::Object(Default::default())))
                .collect(),
        )
    }
}

/// Dispatcher events forwarded by the client script.
///
/// Only `CALL_UPDATE` carries data; every other action type decodes to
/// [`HostEvent::Other`] and is dropped at the boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    #[serde(rename = "CALL_UPDATE", rename_all = "camelCase")]
    CallUpdate {
        channel_id: String,
        #[serde(default)]
        ongoing_rings: Option<RingSnapshot>,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
impl HostEvent {
    /// Build a call update from a list of ringer ids
    pub fn call_update<I, K>(channel_id: impl Into<String>, ringers: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        HostEvent::CallUpdate {
            channel_id: channel_id.into(),
            ongoing_rings: Some(ringers.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_update_decodes_rings() {
        let event: HostEvent = serde_json::from_str(
            r#"{"type":"CALL_UPDATE","channelId":"c1","ongoingRings":{"u1":{"at":1},"u2":true}}"#,
        )
        .unwrap();
        match event {
            HostEvent::CallUpdate { channel_id, ongoing_rings } => {
                assert_eq!(channel_id, "c1");
                let rings = ongoing_rings.unwrap();
                assert!(rings.contains("u1"));
                assert!(rings.contains("u2"));
                assert_eq!(rings.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn null_rings_decode_as_none() {
        let event: HostEvent =
            serde_json::from_str(r#"{"type":"CALL_UPDATE","channelId":"c1","ongoingRings":null}"#)
                .unwrap();
        assert_eq!(
            event,
            HostEvent::CallUpdate { channel_id: "c1".into(), ongoing_rings: None }
        );
    }

    #[test]
    fn other_action_types_are_ignored() {
        let event: HostEvent =
            serde_json::from_str(r#"{"type":"MESSAGE_CREATE","channelId":"c1"}"#).unwrap();
        assert_eq!(event, HostEvent::Other);
    }

    #[test]
    fn display_name_prefers_global_name() {
        let mut user = User {
            id: "1".into(),
            username: "clay".into(),
            global_name: Some("Clay".into()),
            avatar: None,
            discriminator: Some("0007".into()),
        };
        assert_eq!(user.display_name(), "Clay");
        user.global_name = None;
        assert_eq!(user.display_name(), "clay");
        assert_eq!(user.default_avatar_index(), 2);
    }

    #[test]
    fn null_recipients_decode_as_empty() {
        let channel: Channel =
            serde_json::from_str(r#"{"id":"c1","name":"general","guild_id":"g1","recipients":null}"#)
                .unwrap();
        assert!(channel.recipients.is_empty());
        assert_eq!(channel.guild(), Some("g1"));
    }

    #[test]
    fn bad_discriminator_counts_as_zero() {
        assert_eq!(discriminator_index(Some("abc")), 0);
        assert_eq!(discriminator_index(None), 0);
        assert_eq!(discriminator_index(Some("9")), 4);
    }
}
