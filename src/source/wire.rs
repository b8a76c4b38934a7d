//! JSON shapes served by the client gateway.

use serde::{Deserialize, Serialize};

use crate::domain::{
    EntityKind, FormattedText, Identity, PhotoSize, RawContent, RawItem, TextEntity,
};
use crate::source::AuthState;

#[derive(Debug, Deserialize)]
pub struct TypeTag {
    #[serde(rename = "@type")]
    pub kind: String,
}

impl From<TypeTag> for AuthState {
    fn from(tag: TypeTag) -> Self {
        match tag.kind.as_str() {
            "authorizationStateReady" => AuthState::Ready,
            "authorizationStateWaitTdlibParameters" => AuthState::WaitParameters,
            "authorizationStateWaitPhoneNumber" => AuthState::WaitPhoneNumber,
            "authorizationStateWaitCode" => AuthState::WaitCode,
            "authorizationStateClosed" => AuthState::Closed,
            _ => AuthState::Other(tag.kind),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GatewayError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PhoneNumberRequest<'a> {
    pub phone_number: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CodeRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RemoteFile {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct File {
    pub remote: RemoteFile,
}

#[derive(Debug, Deserialize)]
pub struct ChatPhoto {
    pub small: File,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub photo: Option<ChatPhoto>,
}

impl From<Chat> for Identity {
    fn from(chat: Chat) -> Self {
        Identity {
            id: chat.id,
            title: chat.title,
            photo_ref: chat.photo.map(|p| p.small.remote.id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Messages {
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub date: i64,
    pub content: Content,
}

impl From<Message> for RawItem {
    fn from(msg: Message) -> Self {
        RawItem {
            id: msg.id,
            chat_id: msg.chat_id,
            date: msg.date,
            content: msg.content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(rename = "@type")]
    pub kind: String,
    pub text: Option<Text>,
    pub caption: Option<Text>,
    pub photo: Option<Photo>,
    pub document: Option<Document>,
}

impl From<Content> for RawContent {
    fn from(content: Content) -> Self {
        let caption = content.caption.map(Into::into).unwrap_or_default();
        match content.kind.as_str() {
            "messageText" => RawContent::Text(content.text.map(Into::into).unwrap_or_default()),
            "messagePhoto" => RawContent::Photo {
                sizes: content
                    .photo
                    .map(|p| p.sizes.into_iter().map(Into::into).collect())
                    .unwrap_or_default(),
                caption,
            },
            "messageDocument" => RawContent::Document {
                remote_ref: content.document.map(|d| d.document.remote.id),
                caption,
            },
            _ => RawContent::Other { kind: content.kind },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Text {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl From<Text> for FormattedText {
    fn from(text: Text) -> Self {
        FormattedText {
            text: text.text,
            entities: text.entities.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Entity {
    pub offset: usize,
    pub length: usize,
    #[serde(rename = "type")]
    pub kind: EntityType,
}

#[derive(Debug, Deserialize)]
pub struct EntityType {
    #[serde(rename = "@type")]
    pub kind: String,
    pub url: Option<String>,
}

impl From<Entity> for TextEntity {
    fn from(entity: Entity) -> Self {
        let kind = match (entity.kind.kind.as_str(), entity.kind.url) {
            ("textEntityTypeTextUrl", Some(url)) => EntityKind::TextUrl { url },
            ("textEntityTypeUrl", _) => EntityKind::Url,
            _ => EntityKind::Other,
        };
        TextEntity {
            offset: entity.offset,
            length: entity.length,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub sizes: Vec<Size>,
}

#[derive(Debug, Deserialize)]
pub struct Size {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub photo: File,
}

impl From<Size> for PhotoSize {
    fn from(size: Size) -> Self {
        PhotoSize {
            kind: size.kind,
            width: size.width,
            height: size.height,
            remote_ref: size.photo.remote.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Document {
    pub document: File,
}
