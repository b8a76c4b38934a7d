//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::{HarvestError, Result};
use crate::domain::{FormattedText, Identity, RawContent, RawItem};
use crate::source::{AuthState, SourceClient};

pub const CHANNEL_ID: i64 = -100_500;

pub fn text_item(id: i64, text: &str) -> RawItem {
    RawItem {
        id,
        chat_id: CHANNEL_ID,
        date: 1_714_000_000 + id,
        content: RawContent::Text(FormattedText::plain(text)),
    }
}

pub fn texts(ids: &[i64]) -> Vec<RawItem> {
    ids.iter().map(|&id| text_item(id, &format!("message {}", id))).collect()
}

/// A source whose fetch results are queued up front.
///
/// Once the queue is drained every fetch returns an empty page.
pub struct FakeSource {
    ready: AtomicBool,
    ready_after_probes: AtomicUsize,
    pages: Mutex<VecDeque<Result<Vec<RawItem>>>>,
    cursors: Mutex<Vec<Option<i64>>>,
    probes: AtomicUsize,
    phone_numbers: Mutex<Vec<String>>,
    fetch_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn ready() -> Self {
        Self {
            ready: AtomicBool::new(true),
            ready_after_probes: AtomicUsize::new(0),
            pages: Mutex::new(VecDeque::new()),
            cursors: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            phone_numbers: Mutex::new(Vec::new()),
            fetch_delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every fetch takes `delay` before returning its page.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn not_ready() -> Self {
        let source = Self::ready();
        source.ready.store(false, Ordering::SeqCst);
        source
    }

    /// Become ready on the `n`th authorization probe.
    pub fn ready_after(n: usize) -> Self {
        let source = Self::not_ready();
        source.ready_after_probes.store(n, Ordering::SeqCst);
        source
    }

    pub fn push_page(&self, items: Vec<RawItem>) {
        self.pages.lock().unwrap().push_back(Ok(items));
    }

    pub fn push_error(&self, message: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(Err(HarvestError::Source(message.to_string())));
    }

    /// Cursors passed to `fetch_since`, in call order.
    pub fn cursors(&self) -> Vec<Option<i64>> {
        self.cursors.lock().unwrap().clone()
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn phone_numbers(&self) -> Vec<String> {
        self.phone_numbers.lock().unwrap().clone()
    }

    fn identity() -> Identity {
        Identity {
            id: CHANNEL_ID,
            title: "Fake Channel".into(),
            photo_ref: Some("AQADfake".into()),
        }
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn authorization_state(&self) -> Result<AuthState> {
        let probe = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        let threshold = self.ready_after_probes.load(Ordering::SeqCst);
        if threshold > 0 && probe >= threshold {
            self.ready.store(true, Ordering::SeqCst);
        }

        if self.ready.load(Ordering::SeqCst) {
            Ok(AuthState::Ready)
        } else {
            Ok(AuthState::WaitPhoneNumber)
        }
    }

    async fn submit_phone_number(&self, phone_number: &str) -> Result<()> {
        self.phone_numbers
            .lock()
            .unwrap()
            .push(phone_number.to_string());
        Ok(())
    }

    async fn complete_challenge(&self, code: &str) -> Result<Identity> {
        if code == "12345" {
            self.ready.store(true, Ordering::SeqCst);
            Ok(Self::identity())
        } else {
            Err(HarvestError::Source("PHONE_CODE_INVALID".into()))
        }
    }

    async fn resolve_identity(&self) -> Result<Identity> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(Self::identity())
        } else {
            Err(HarvestError::NotReady("session not authorized".into()))
        }
    }

    async fn fetch_since(&self, cursor: Option<i64>, limit: usize) -> Result<Vec<RawItem>> {
        self.cursors.lock().unwrap().push(cursor);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.pages.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut items)) => {
                items.truncate(limit);
                Ok(items)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}
