//! Items as delivered by the source, before transformation.

/// One history entry from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub id: i64,
    pub chat_id: i64,
    /// Seconds since the Unix epoch.
    pub date: i64,
    pub content: RawContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawContent {
    Text(FormattedText),
    Photo { sizes: Vec<PhotoSize>, caption: FormattedText },
    Document {
        remote_ref: Option<String>,
        caption: FormattedText,
    },
    /// Any content kind the harvester does not record.
    Other { kind: String },
}

impl RawContent {
    pub fn kind(&self) -> &str {
        match self {
            RawContent::Text(_) => "messageText",
            RawContent::Photo { .. } => "messagePhoto",
            RawContent::Document { .. } => "messageDocument",
            RawContent::Other { kind } => kind,
        }
    }
}

/// Text with formatting annotations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedText {
    pub text: String,
    pub entities: Vec<TextEntity>,
}

impl FormattedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

/// Annotation over a span of text. Offsets count UTF-16 code units.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntity {
    pub offset: usize,
    pub length: usize,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Display text pointing at an explicit URL.
    TextUrl { url: String },
    /// The span itself is a URL.
    Url,
    Other,
}

/// One resolution of a photo, smallest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSize {
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub remote_ref: String,
}
