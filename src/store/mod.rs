pub mod sqlite;

use crate::app::Result;
use crate::domain::{Channel, Message, MessagePage};

pub use sqlite::SqliteStore;

pub trait Store {
    // Channel operations
    fn upsert_channel_if_absent(&self, channel: &Channel) -> Result<bool>;
    fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>>;
    fn list_channels(&self) -> Result<Vec<Channel>>;

    // Message operations
    fn upsert_message_if_absent(&self, message: &Message) -> Result<bool>;
    fn upsert_messages_if_absent(&self, messages: &[Message]) -> Result<usize>;
    fn get_message(&self, message_id: i64) -> Result<Option<Message>>;
    fn list_messages(&self, page: usize, per_page: usize) -> Result<MessagePage>;
    fn count_messages(&self, channel_id: Option<i64>) -> Result<i64>;

    /// Highest stored message id for a channel; the resume cursor.
    fn max_message_id(&self, channel_id: i64) -> Result<Option<i64>>;
}
