pub mod channel;
pub mod message;
pub mod raw;

pub use channel::{Channel, Identity};
pub use message::{Message, MessagePage};
pub use raw::{EntityKind, FormattedText, PhotoSize, RawContent, RawItem, TextEntity};
