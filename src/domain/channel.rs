use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The external channel this instance harvests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: i64,
    pub username: Option<String>,
    pub title: Option<String>,
    pub photo_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(channel_id: i64) -> Self {
        Self {
            channel_id,
            username: None,
            title: None,
            photo_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.username.as_ref().map(|u| format!("@{}", u)))
            .unwrap_or_else(|| self.channel_id.to_string())
    }
}

/// Identity reported by the source once a session is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub title: String,
    pub photo_ref: Option<String>,
}

impl Identity {
    pub fn into_channel(self, username: Option<String>) -> Channel {
        Channel {
            channel_id: self.id,
            username,
            title: Some(self.title),
            photo_ref: self.photo_ref,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_prefers_title() {
        let mut channel = Channel::new(-100123);
        channel.username = Some("rustlang".into());
        channel.title = Some("Rust News".into());
        assert_eq!(channel.display_title(), "Rust News");
    }

    #[test]
    fn test_display_title_falls_back_to_username_then_id() {
        let mut channel = Channel::new(-100123);
        assert_eq!(channel.display_title(), "-100123");
        channel.username = Some("rustlang".into());
        assert_eq!(channel.display_title(), "@rustlang");
    }

    #[test]
    fn test_identity_into_channel() {
        let identity = Identity {
            id: 42,
            title: "Harvested".into(),
            photo_ref: Some("AQADBAAD".into()),
        };
        let channel = identity.into_channel(Some("harvested".into()));
        assert_eq!(channel.channel_id, 42);
        assert_eq!(channel.title.as_deref(), Some("Harvested"));
        assert_eq!(channel.username.as_deref(), Some("harvested"));
        assert_eq!(channel.photo_ref.as_deref(), Some("AQADBAAD"));
    }
}
