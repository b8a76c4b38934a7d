use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical record of one harvested item.
///
/// `message_id` is assigned by the source and is the only deduplication key.
/// Rows are immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub channel_id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// First embedded link of a text item, or the largest photo variant.
    pub media_url: Option<String>,
    /// Remote reference of an attached document.
    pub photo_media_url: Option<String>,
}

impl Message {
    pub fn new(message_id: i64, channel_id: i64, timestamp: DateTime<Utc>, text: String) -> Self {
        Self {
            message_id,
            channel_id,
            timestamp,
            text,
            media_url: None,
            photo_media_url: None,
        }
    }

    /// Single-line preview for listings.
    pub fn preview(&self, max_chars: usize) -> String {
        let line = self.text.lines().next().unwrap_or("");
        if line.chars().count() > max_chars {
            let cut: String = line.chars().take(max_chars).collect();
            format!("{}…", cut)
        } else {
            line.to_string()
        }
    }
}

/// One page of stored messages, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub page: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_chars() {
        let msg = Message::new(1, 1, Utc::now(), "héllo wörld\nsecond line".into());
        assert_eq!(msg.preview(5), "héllo…");
        assert_eq!(msg.preview(50), "héllo wörld");
    }
}
