use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{HarvestError, Result};
use crate::domain::{Channel, Message, MessagePage};
use crate::store::Store;

const MESSAGE_COLUMNS: &str =
    "message_id, channel_id, timestamp, text, media_url, photo_media_url";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| HarvestError::Migration(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            HarvestError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<Channel> {
        Ok(Channel {
            channel_id: row.get(0)?,
            username: row.get(1)?,
            title: row.get(2)?,
            photo_ref: row.get(3)?,
            created_at: row
                .get::<_, String>(4)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
        Ok(Message {
            message_id: row.get(0)?,
            channel_id: row.get(1)?,
            timestamp: row
                .get::<_, String>(2)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_default(),
            text: row.get(3)?,
            media_url: row.get(4)?,
            photo_media_url: row.get(5)?,
        })
    }

    fn insert_message(conn: &Connection, message: &Message) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT OR IGNORE INTO messages
                 (message_id, channel_id, timestamp, text, media_url, photo_media_url, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.message_id,
                message.channel_id,
                message.timestamp.to_rfc3339(),
                message.text,
                message.media_url,
                message.photo_media_url,
                Utc::now().to_rfc3339()
            ],
        )
    }
}

impl Store for SqliteStore {
    fn upsert_channel_if_absent(&self, channel: &Channel) -> Result<bool> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO channels (channel_id, username, title, photo_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel.channel_id,
                channel.username,
                channel.title,
                channel.photo_ref,
                channel.created_at.to_rfc3339()
            ],
        )?;

        Ok(inserted > 0)
    }

    fn get_channel(&self, channel_id: i64) -> Result<Option<Channel>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT channel_id, username, title, photo_ref, created_at
                 FROM channels WHERE channel_id = ?1",
                params![channel_id],
                Self::channel_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT channel_id, username, title, photo_ref, created_at
             FROM channels ORDER BY title, channel_id",
        )?;

        let channels = stmt
            .query_map([], Self::channel_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(channels)
    }

    fn upsert_message_if_absent(&self, message: &Message) -> Result<bool> {
        let conn = self.conn()?;
        Ok(Self::insert_message(&conn, message)? > 0)
    }

    fn upsert_messages_if_absent(&self, messages: &[Message]) -> Result<usize> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let mut count = 0;

        for message in messages {
            count += Self::insert_message(&tx, message)?;
        }

        tx.commit()?;
        Ok(count)
    }

    fn get_message(&self, message_id: i64) -> Result<Option<Message>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE message_id = ?1", MESSAGE_COLUMNS),
                params![message_id],
                Self::message_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_messages(&self, page: usize, per_page: usize) -> Result<MessagePage> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let conn = self.conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        let total_pages = (total as usize).div_ceil(per_page).max(1);

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages
             ORDER BY timestamp DESC, message_id DESC
             LIMIT ?1 OFFSET ?2",
            MESSAGE_COLUMNS
        ))?;

        let messages = stmt
            .query_map(
                params![per_page as i64, ((page - 1) * per_page) as i64],
                Self::message_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(MessagePage {
            messages,
            page,
            total_pages,
        })
    }

    fn count_messages(&self, channel_id: Option<i64>) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = match channel_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?,
        };

        Ok(count)
    }

    fn max_message_id(&self, channel_id: i64) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let max: Option<i64> = conn.query_row(
            "SELECT MAX(message_id) FROM messages WHERE channel_id = ?1",
            params![channel_id],
            |row| row.get(0),
        )?;

        Ok(max)
    }
}
