//! Fakes for exercising the dispatch pipeline without network or storage.

use std::{
    collections::{HashSet, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{
    ai::{Classification, Classifier},
    domain::{InterestSet, Item, PipelineError, ReportEvent, ReportKind, Verdict},
    infrastructure::notifier::Reporter,
};

use super::{action::ActionHandler, source::DiscoverySource};

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == ReportKind::Error)
            .map(|e| e.message.clone())
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: ReportEvent) {
        self.events.lock().push(event);
    }
}

/// Marks every item whose text contains `marker` as not relevant.
pub struct ScriptedClassifier {
    marker: String,
    delay: Duration,
    configured: bool,
    calls: Mutex<Vec<Vec<String>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
            delay: Duration::ZERO,
            configured: true,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Item ids of every classified batch, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(
        &'a self,
        batch: &'a [Item],
        _interests: &'a InterestSet,
    ) -> BoxFuture<'a, Classification> {
        Box::pin(async move {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .push(batch.iter().map(|item| item.id.clone()).collect());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            Classification {
                verdicts: batch
                    .iter()
                    .map(|item| Verdict::new(item.id.clone(), !item.text.contains(&self.marker)))
                    .collect(),
                error: None,
            }
        })
    }

    fn check_configuration(&self) -> Result<(), PipelineError> {
        if self.configured {
            Ok(())
        } else {
            Err(PipelineError::Configuration("classifier not configured".into()))
        }
    }
}

/// Records applied item ids; fails for ids registered with `failing`.
#[derive(Default)]
pub struct RecordingActions {
    applied: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingActions {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().clone()
    }
}

impl ActionHandler for RecordingActions {
    fn apply<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.applied.lock().push(item.id.clone());
            if self.failing.contains(&item.id) {
                return Err(anyhow!("dismiss control not found"));
            }
            Ok(true)
        })
    }
}

/// Hands out pre-built pages, then empty pages.
#[derive(Default)]
pub struct PagedSource {
    pages: Mutex<VecDeque<Vec<Item>>>,
    delay: Duration,
    requests: AtomicUsize,
}

impl PagedSource {
    pub fn new(pages: Vec<Vec<Item>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl DiscoverySource for PagedSource {
    fn request_more(&self) -> BoxFuture<'_, Result<Vec<Item>>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.pages.lock().pop_front().unwrap_or_default())
        })
    }
}

pub fn items(prefix: &str, n: usize) -> Vec<Item> {
    (1..=n)
        .map(|i| Item::new(format!("{prefix}{i}"), format!("{prefix} item {i}")))
        .collect()
}
