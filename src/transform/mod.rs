use chrono::DateTime;
use tracing::debug;

use crate::domain::{EntityKind, FormattedText, Message, RawContent, RawItem};

#[derive(Clone)]
pub struct Transformer;

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Map one source item to a stored message.
    ///
    /// Returns `None` for unsupported content kinds and for items whose text
    /// or caption is empty.
    pub fn transform(&self, raw: &RawItem) -> Option<Message> {
        let (text, media_url, photo_media_url) = match &raw.content {
            RawContent::Text(formatted) => (&formatted.text, extract_first_url(formatted), None),
            RawContent::Photo { sizes, caption } => (
                &caption.text,
                sizes.last().map(|s| s.remote_ref.clone()),
                None,
            ),
            RawContent::Document {
                remote_ref,
                caption,
            } => (&caption.text, None, remote_ref.clone()),
            RawContent::Other { kind } => {
                debug!(message_id = raw.id, kind = %kind, "Skipping unsupported content");
                return None;
            }
        };

        if text.is_empty() {
            debug!(message_id = raw.id, kind = raw.content.kind(), "Skipping item without text");
            return None;
        }

        let Some(timestamp) = DateTime::from_timestamp(raw.date, 0) else {
            debug!(message_id = raw.id, date = raw.date, "Skipping item with invalid date");
            return None;
        };

        let mut message = Message::new(raw.id, raw.chat_id, timestamp, text.clone());
        message.media_url = media_url;
        message.photo_media_url = photo_media_url;
        Some(message)
    }

    pub fn transform_all(&self, raws: &[RawItem]) -> Vec<Message> {
        raws.iter().filter_map(|raw| self.transform(raw)).collect()
    }
}

/// First link embedded in formatted text.
///
/// An explicit display-text link wins over a bare URL span; within each kind
/// the earliest annotation wins.
pub fn extract_first_url(text: &FormattedText) -> Option<String> {
    let explicit = text.entities.iter().find_map(|entity| match &entity.kind {
        EntityKind::TextUrl { url } => Some(url.clone()),
        _ => None,
    });
    if explicit.is_some() {
        return explicit;
    }

    text.entities
        .iter()
        .filter(|entity| entity.kind == EntityKind::Url)
        .find_map(|entity| utf16_slice(&text.text, entity.offset, entity.length))
}

fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    if length == 0 || end > units.len() {
        return None;
    }
    String::from_utf16(&units[offset..end]).ok()
}
