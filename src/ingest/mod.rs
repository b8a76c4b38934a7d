//! One fetch → transform → store cycle.

use std::sync::Arc;

use tracing::{debug, info};

use crate::app::Result;
use crate::source::{SourceClient, DEFAULT_PAGE_SIZE};
use crate::store::Store;
use crate::transform::Transformer;

/// Result of a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Cursor to resume from; never lower than the cursor the cycle began with.
    pub cursor: Option<i64>,
    pub had_new_data: bool,
    /// Items returned by the source.
    pub fetched: usize,
    /// Records produced by the transformer.
    pub produced: usize,
    /// Rows actually inserted (duplicates excluded).
    pub stored: usize,
}

pub struct Ingestor<S: Store + Send + Sync + 'static> {
    source: Arc<dyn SourceClient>,
    store: Arc<S>,
    transformer: Transformer,
    page_size: usize,
}

impl<S: Store + Send + Sync + 'static> Ingestor<S> {
    pub fn new(source: Arc<dyn SourceClient>, store: Arc<S>) -> Self {
        Self::with_page_size(source, store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(source: Arc<dyn SourceClient>, store: Arc<S>, page_size: usize) -> Self {
        Self {
            source,
            store,
            transformer: Transformer::new(),
            page_size,
        }
    }

    /// Fetch one page after `since`, store every record it yields and
    /// report the advanced cursor.
    ///
    /// Source and store failures are returned as-is; retrying is the
    /// caller's business.
    pub async fn run_cycle(&self, since: Option<i64>) -> Result<CycleOutcome> {
        let raws = self.source.fetch_since(since, self.page_size).await?;
        let messages = self.transformer.transform_all(&raws);
        debug!(
            fetched = raws.len(),
            produced = messages.len(),
            "Transformed source page"
        );

        let stored = if messages.is_empty() {
            0
        } else {
            self.store.upsert_messages_if_absent(&messages)?
        };

        let cursor = advance_cursor(since, messages.iter().map(|m| m.message_id));
        if stored > 0 {
            info!(stored, cursor = ?cursor, "Stored new messages");
        }

        Ok(CycleOutcome {
            cursor,
            had_new_data: cursor != since,
            fetched: raws.len(),
            produced: messages.len(),
            stored,
        })
    }
}

fn advance_cursor(since: Option<i64>, ids: impl Iterator<Item = i64>) -> Option<i64> {
    match (since, ids.max()) {
        (Some(since), Some(max)) => Some(since.max(max)),
        (None, max) => max,
        (since, None) => since,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawContent;
    use crate::store::SqliteStore;
    use crate::testing::{text_item, texts, FakeSource, CHANNEL_ID};

    fn ingestor(source: Arc<FakeSource>) -> (Ingestor<SqliteStore>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (Ingestor::new(source, store.clone()), store)
    }

    #[test]
    fn test_advance_cursor() {
        assert_eq!(advance_cursor(None, [101, 103, 102].into_iter()), Some(103));
        assert_eq!(advance_cursor(Some(50), std::iter::empty()), Some(50));
        assert_eq!(advance_cursor(None, std::iter::empty()), None);
        // A stale id never moves the cursor backwards
        assert_eq!(advance_cursor(Some(200), [150].into_iter()), Some(200));
    }

    #[tokio::test]
    async fn test_cycle_from_empty_cursor() {
        let source = Arc::new(FakeSource::ready());
        source.push_page(texts(&[101, 102, 103]));
        let (ingestor, store) = ingestor(source.clone());

        let outcome = ingestor.run_cycle(None).await.unwrap();

        assert_eq!(outcome.cursor, Some(103));
        assert!(outcome.had_new_data);
        assert_eq!(outcome.stored, 3);
        assert_eq!(source.cursors(), vec![None]);
        assert_eq!(store.max_message_id(CHANNEL_ID).unwrap(), Some(103));
    }

    #[tokio::test]
    async fn test_empty_page_keeps_cursor() {
        let source = Arc::new(FakeSource::ready());
        let (ingestor, _) = ingestor(source.clone());

        let outcome = ingestor.run_cycle(Some(77)).await.unwrap();

        assert_eq!(outcome.cursor, Some(77));
        assert!(!outcome.had_new_data);
        assert_eq!(outcome.fetched, 0);
        assert_eq!(source.cursors(), vec![Some(77)]);
    }

    #[tokio::test]
    async fn test_skipped_items_do_not_advance_cursor() {
        let source = Arc::new(FakeSource::ready());
        let mut sticker = text_item(11, "");
        sticker.content = RawContent::Other {
            kind: "messageSticker".into(),
        };
        source.push_page(vec![text_item(10, ""), sticker]);
        let (ingestor, store) = ingestor(source);

        let outcome = ingestor.run_cycle(Some(9)).await.unwrap();

        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.produced, 0);
        assert_eq!(outcome.cursor, Some(9));
        assert!(!outcome.had_new_data);
        assert_eq!(store.count_messages(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replaying_batch_is_idempotent() {
        let source = Arc::new(FakeSource::ready());
        source.push_page(texts(&[1, 2, 3]));
        source.push_page(texts(&[1, 2, 3]));
        let (ingestor, store) = ingestor(source);

        let first = ingestor.run_cycle(None).await.unwrap();
        let second = ingestor.run_cycle(None).await.unwrap();

        assert_eq!(first.stored, 3);
        assert_eq!(second.stored, 0);
        assert_eq!(second.cursor, Some(3));
        assert_eq!(store.count_messages(Some(CHANNEL_ID)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_source_error_surfaces() {
        let source = Arc::new(FakeSource::ready());
        source.push_error("FLOOD_WAIT_3");
        let (ingestor, store) = ingestor(source);

        let err = ingestor.run_cycle(Some(5)).await.unwrap_err();

        assert_eq!(err.kind(), crate::app::ErrorKind::TransientSource);
        assert_eq!(store.count_messages(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_page_size_bounds_fetch() {
        let source = Arc::new(FakeSource::ready());
        source.push_page(texts(&[1, 2, 3, 4, 5]));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = Ingestor::with_page_size(source, store, 2);

        let outcome = ingestor.run_cycle(None).await.unwrap();

        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.cursor, Some(2));
    }
}
