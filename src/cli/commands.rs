use std::sync::Arc;

use crate::app::{AppContext, HarvestError, Result};
use crate::daemon::{self, Daemon};
use crate::ingest::CycleOutcome;
use crate::store::Store;

pub async fn run(ctx: AppContext) -> Result<()> {
    Daemon::new(Arc::new(ctx)).run().await
}

pub fn stop() -> Result<()> {
    let pid = daemon::stop_daemon().map_err(HarvestError::Other)?;
    println!("Sent stop signal to harvester (PID {})", pid);
    Ok(())
}

pub async fn status(ctx: &AppContext) -> Result<()> {
    println!("{}", daemon::daemon_status());

    match ctx.source.authorization_state().await {
        Ok(state) => println!("Session: {:?}", state),
        Err(e) => println!("Session: unavailable ({})", e),
    }

    let channels = ctx.store.list_channels()?;
    if channels.is_empty() {
        println!("No channel recorded yet");
    }
    for channel in channels {
        let count = ctx.store.count_messages(Some(channel.channel_id))?;
        let cursor = ctx.store.max_message_id(channel.channel_id)?;
        println!(
            "{} ({} messages, last id {})",
            channel.display_title(),
            count,
            cursor.map_or_else(|| "-".to_string(), |id| id.to_string())
        );
    }

    Ok(())
}

pub async fn auth(ctx: &AppContext, code: &str) -> Result<()> {
    let channel = ctx.gate.complete_challenge(code).await?;
    println!("Authenticated. Harvesting {}", channel.display_title());
    Ok(())
}

/// One cycle from the stored cursor.
pub async fn poll(ctx: &AppContext) -> Result<CycleOutcome> {
    let since = ctx.gate.starting_cursor().await?;
    let outcome = ctx.ingestor.run_cycle(since).await?;

    println!(
        "Fetched {} items, stored {} new messages",
        outcome.fetched, outcome.stored
    );
    match outcome.cursor {
        Some(cursor) => println!("Cursor: {}", cursor),
        None => println!("Cursor: none"),
    }

    Ok(outcome)
}

pub fn list(ctx: &AppContext, page: usize, per_page: usize) -> Result<()> {
    let listing = ctx.store.list_messages(page, per_page)?;

    if listing.messages.is_empty() {
        println!("No messages");
        return Ok(());
    }

    for message in &listing.messages {
        let link = message
            .media_url
            .as_deref()
            .or(message.photo_media_url.as_deref())
            .map(|url| format!("  [{}]", url))
            .unwrap_or_default();

        println!(
            "{:>10} {} {}{}",
            message.message_id,
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.preview(60),
            link
        );
    }
    println!("Page {}/{}", listing.page, listing.total_pages);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{texts, FakeSource, CHANNEL_ID};

    fn context(source: Arc<FakeSource>) -> AppContext {
        let mut config = Config::default();
        config.source.channel_username = "fake".into();
        AppContext::in_memory(config, source).unwrap()
    }

    #[tokio::test]
    async fn test_poll_resumes_from_store() {
        let source = Arc::new(FakeSource::ready());
        source.push_page(texts(&[10, 11]));
        source.push_page(texts(&[12]));
        let ctx = context(source.clone());

        let first = poll(&ctx).await.unwrap();
        let second = poll(&ctx).await.unwrap();

        assert_eq!(first.cursor, Some(11));
        assert_eq!(second.cursor, Some(12));
        assert_eq!(source.cursors(), vec![None, Some(11)]);
        assert_eq!(ctx.store.count_messages(Some(CHANNEL_ID)).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_poll_fails_before_authentication() {
        let source = Arc::new(FakeSource::not_ready());
        let ctx = context(source.clone());

        assert!(poll(&ctx).await.is_err());
        assert!(source.cursors().is_empty());
    }

    #[tokio::test]
    async fn test_auth_records_channel() {
        let source = Arc::new(FakeSource::not_ready());
        let ctx = context(source);

        assert!(auth(&ctx, "99999").await.is_err());
        auth(&ctx, "12345").await.unwrap();

        assert!(ctx.store.get_channel(CHANNEL_ID).unwrap().is_some());
    }

    #[test]
    fn test_stop_without_running_instance_fails() {
        // Only meaningful when no PID file exists; never signal a real process.
        if Daemon::pid_file_path().is_some_and(|path| !path.exists()) {
            let err = stop().unwrap_err();
            assert!(matches!(err, HarvestError::Other(_)));
            assert!(err.to_string().contains("not running") || err.to_string().contains("PID file"));
        }
    }

    #[tokio::test]
    async fn test_list_and_status_on_empty_store() {
        let source = Arc::new(FakeSource::ready());
        let ctx = context(source);

        list(&ctx, 1, 20).unwrap();
        status(&ctx).await.unwrap();
    }
}
