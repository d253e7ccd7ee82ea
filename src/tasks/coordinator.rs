use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::{
    ai::Classifier,
    config::PipelineConfig,
    domain::{
        InterestSet, InterestStore, Item, PipelineError, PipelineStats, QueueSnapshot, ReportEvent,
    },
    infrastructure::{notifier::Reporter, shutdown::ShutdownListener},
};

use super::{
    action::ActionHandler,
    queue::{Batch, BatchQueue, Enqueued, QueueError},
    scheduler::{schedule_repeating, TimerHandle},
    source::DiscoverySource,
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineTiming {
    pub batch_timeout: Duration,
    pub next_batch_delay: Duration,
    pub stabilization_time: Duration,
    pub settle_delay: Duration,
}

impl From<&PipelineConfig> for PipelineTiming {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_timeout: config.batch_timeout,
            next_batch_delay: config.next_batch_delay,
            stabilization_time: config.stabilization_time,
            settle_delay: config.settle_delay,
        }
    }
}

/// Owns the pipeline lifecycle and the single dispatch loop that moves
/// batches from the queue through the classifier to the action handler.
pub struct DispatchCoordinator {
    queue: Arc<BatchQueue>,
    classifier: Arc<dyn Classifier>,
    actions: Arc<dyn ActionHandler>,
    reporter: Arc<dyn Reporter>,
    interests: Arc<InterestStore>,
    source: Option<Arc<dyn DiscoverySource>>,
    timing: PipelineTiming,
    wake: Arc<Notify>,
    timer: Mutex<Option<TimerHandle>>,
    stats: Mutex<PipelineStats>,
}

impl DispatchCoordinator {
    pub fn new(
        queue: Arc<BatchQueue>,
        classifier: Arc<dyn Classifier>,
        actions: Arc<dyn ActionHandler>,
        reporter: Arc<dyn Reporter>,
        interests: Arc<InterestStore>,
        timing: PipelineTiming,
    ) -> Self {
        Self {
            queue,
            classifier,
            actions,
            reporter,
            interests,
            source: None,
            timing,
            wake: Arc::new(Notify::new()),
            timer: Mutex::new(None),
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn DiscoverySource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Stopped -> Running. Returns false when already running.
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            tracing::warn!(target: "coordinator", "start requested while already running");
            return false;
        }

        self.queue.start();
        *self.stats.lock() = PipelineStats::default();

        let queue = self.queue.clone();
        let wake = self.wake.clone();
        *timer = Some(schedule_repeating(
            "batch-timeout",
            self.timing.batch_timeout,
            move || {
                if queue.timer_flush_due() {
                    wake.notify_one();
                }
            },
        ));
        drop(timer);

        let batch_size = self.queue.snapshot().batch_size;
        self.reporter.report(ReportEvent::info(format!(
            "content filter started, batch size {batch_size}"
        )));

        if self.interests.snapshot().is_empty() {
            self.report_error(&PipelineError::Configuration(
                "no interests configured; items will not be classified".into(),
            ));
        }
        if let Err(err) = self.classifier.check_configuration() {
            self.report_error(&err);
        }
        true
    }

    /// Running -> Stopped. An in-flight classification finishes on its own
    /// but its verdicts are discarded.
    pub fn stop(&self) -> bool {
        let Some(timer) = self.timer.lock().take() else {
            return false;
        };
        timer.cancel();
        self.queue.stop();
        let stats = self.stats();
        tracing::info!(
            target: "coordinator",
            processed = stats.processed,
            filtered = stats.filtered,
            action_failures = stats.action_failures,
            "filter stopped"
        );
        self.reporter
            .report(ReportEvent::info("content filter stopped"));
        true
    }

    pub fn is_running(&self) -> bool {
        self.queue.snapshot().running
    }

    /// Queues one discovered item. Returns whether it was accepted.
    pub fn enqueue(&self, item: Item) -> bool {
        let outcome = self.queue.enqueue(item);
        if !outcome.accepted() {
            return false;
        }
        self.stats.lock().processed += 1;
        if matches!(outcome, Enqueued::Queued { ready: true }) {
            self.wake.notify_one();
        }
        true
    }

    pub fn enqueue_all(&self, items: impl IntoIterator<Item = Item>) -> usize {
        items
            .into_iter()
            .map(|item| self.enqueue(item))
            .filter(|accepted| *accepted)
            .count()
    }

    pub fn set_batch_size(&self, batch_size: usize) -> Result<(), QueueError> {
        match self.queue.set_batch_size(batch_size) {
            Ok(()) => {
                self.reporter.report(ReportEvent::success(format!(
                    "batch size updated to {batch_size}"
                )));
                Ok(())
            }
            Err(err) => {
                self.reporter.report(ReportEvent::error(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn set_interests(&self, interests: InterestSet) {
        tracing::info!(target: "coordinator", topics = interests.len(), "interests updated");
        self.interests.replace(interests);
    }

    /// External stabilizing flag: while set, batches are not flushed.
    pub fn set_stabilizing(&self, stabilizing: bool) {
        self.queue.set_stabilizing(stabilizing);
        if !stabilizing && self.queue.has_pending() {
            self.wake.notify_one();
        }
    }

    pub fn stats(&self) -> PipelineStats {
        *self.stats.lock()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(&mut shutdown).await;
        })
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = self.wake.notified() => {}
            }
            self.dispatch_available(shutdown).await;
        }
        tracing::info!(target: "coordinator", "dispatch loop stopped");
    }

    async fn dispatch_available(&self, shutdown: &mut ShutdownListener) {
        while let Some(batch) = self.queue.flush() {
            if !self.process_batch(batch).await {
                // aborted for configuration: no refill, no follow-up batch
                break;
            }

            if !self.queue.has_pending() {
                if self.is_running() {
                    self.on_drained(shutdown).await;
                }
                break;
            }

            tokio::select! {
                _ = sleep(self.timing.next_batch_delay) => {}
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Returns false when the cycle was aborted before classification.
    async fn process_batch(&self, batch: Batch) -> bool {
        let epoch = batch.epoch();
        tracing::info!(target: "coordinator", size = batch.len(), epoch, "processing batch");

        let interests = self.interests.snapshot();
        let ran = if interests.is_empty() {
            self.report_error(&PipelineError::Configuration(
                "no interests configured; batch skipped".into(),
            ));
            false
        } else {
            self.classify_and_apply(&batch, &interests).await;
            true
        };

        self.queue.complete_flight(epoch);
        ran
    }

    async fn classify_and_apply(&self, batch: &Batch, interests: &InterestSet) {
        let classification = self.classifier.classify(batch.items(), interests).await;
        if let Some(err) = &classification.error {
            self.report_error(err);
        }

        if !self.queue.is_current(batch.epoch()) {
            tracing::info!(
                target: "coordinator",
                size = batch.len(),
                "pipeline stopped while classifying; discarding verdicts"
            );
            return;
        }

        let lookup: HashMap<&str, &Item> = batch
            .items()
            .iter()
            .map(|item| (item.id.as_str(), item))
            .collect();

        for verdict in classification.verdicts {
            let Some(item) = lookup.get(verdict.item_id.as_str()) else {
                tracing::warn!(
                    target: "coordinator",
                    item_id = %verdict.item_id,
                    "verdict for unknown item ignored"
                );
                continue;
            };
            tracing::debug!(
                target: "coordinator",
                item_id = %item.id,
                relevant = verdict.relevant,
                "verdict"
            );
            if verdict.relevant {
                continue;
            }
            if !self.queue.is_current(batch.epoch()) {
                tracing::info!(target: "coordinator", "pipeline stopped; remaining verdicts discarded");
                return;
            }
            self.stats.lock().filtered += 1;
            self.dismiss(item).await;
        }
    }

    async fn dismiss(&self, item: &Item) {
        let failure = match self.actions.apply(item).await {
            Ok(true) => {
                tracing::debug!(target: "coordinator", item_id = %item.id, "item filtered");
                self.reporter
                    .report(ReportEvent::success(format!("filtered \"{}\"", item.text)));
                return;
            }
            Ok(false) => "handler declined the item".to_string(),
            Err(err) => format!("{err:#}"),
        };
        self.stats.lock().action_failures += 1;
        self.report_error(&PipelineError::Action {
            item_id: item.id.clone(),
            reason: failure,
        });
    }

    async fn on_drained(&self, shutdown: &mut ShutdownListener) {
        self.reporter.report(ReportEvent::info("queue drained"));

        let Some(source) = &self.source else {
            return;
        };

        self.queue.set_refilling(true);
        let refill = tokio::select! {
            result = timeout(self.timing.stabilization_time, source.request_more()) => Some(result),
            _ = shutdown.notified() => None,
        };
        let items = match refill {
            None => {
                self.queue.set_refilling(false);
                return;
            }
            Some(Ok(Ok(items))) => items,
            Some(Ok(Err(err))) => {
                self.reporter
                    .report(ReportEvent::error(format!("refill failed: {err:#}")));
                Vec::new()
            }
            Some(Err(_)) => {
                self.reporter.report(ReportEvent::error(format!(
                    "refill did not complete within {:?}",
                    self.timing.stabilization_time
                )));
                Vec::new()
            }
        };

        let settled = tokio::select! {
            _ = sleep(self.timing.settle_delay) => true,
            _ = shutdown.notified() => false,
        };
        if !settled {
            self.queue.set_refilling(false);
            return;
        }

        let accepted = self.enqueue_all(items);
        self.queue.set_refilling(false);

        if accepted > 0 {
            self.reporter
                .report(ReportEvent::info(format!("loaded {accepted} new items")));
        } else {
            self.reporter
                .report(ReportEvent::info("no new items available"));
        }
    }

    fn report_error(&self, err: &PipelineError) {
        tracing::debug!(target: "coordinator", kind = err.kind(), "pipeline error");
        self.reporter.report(ReportEvent::from(err));
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{
        domain::ReportKind,
        infrastructure::shutdown::Shutdown,
        tasks::testing::{items, PagedSource, RecordingActions, RecordingReporter, ScriptedClassifier},
    };

    struct Harness {
        coordinator: Arc<DispatchCoordinator>,
        classifier: Arc<ScriptedClassifier>,
        actions: Arc<RecordingActions>,
        reporter: Arc<RecordingReporter>,
        shutdown: Shutdown,
        dispatch: JoinHandle<()>,
    }

    fn timing() -> PipelineTiming {
        PipelineTiming {
            batch_timeout: Duration::from_secs(3),
            next_batch_delay: Duration::from_secs(1),
            stabilization_time: Duration::from_secs(4),
            settle_delay: Duration::from_secs(1),
        }
    }

    fn harness(
        batch_size: usize,
        classifier: ScriptedClassifier,
        actions: RecordingActions,
        interests: &str,
        source: Option<Arc<PagedSource>>,
    ) -> Harness {
        let classifier = Arc::new(classifier);
        let actions = Arc::new(actions);
        let reporter = Arc::new(RecordingReporter::default());
        let mut coordinator = DispatchCoordinator::new(
            Arc::new(BatchQueue::new(batch_size)),
            classifier.clone(),
            actions.clone(),
            reporter.clone(),
            Arc::new(InterestStore::new(InterestSet::parse(interests))),
            timing(),
        );
        if let Some(source) = source {
            coordinator = coordinator.with_source(source);
        }
        let coordinator = Arc::new(coordinator);
        let (shutdown, _) = Shutdown::new();
        let dispatch = coordinator.clone().spawn(shutdown.subscribe());
        assert!(coordinator.start());
        Harness {
            coordinator,
            classifier,
            actions,
            reporter,
            shutdown,
            dispatch,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_is_classified_and_irrelevant_items_dismissed() {
        let h = harness(
            3,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.enqueue(Item::new("a", "rust news"));
        h.coordinator.enqueue(Item::new("b", "offtopic offer"));
        h.coordinator.enqueue(Item::new("c", "rust tips"));

        sleep(Duration::from_millis(100)).await;

        assert_eq!(h.classifier.calls(), vec![ids(&["a", "b", "c"])]);
        assert_eq!(h.actions.applied(), ids(&["b"]));
        let stats = h.coordinator.stats();
        assert_eq!((stats.processed, stats.filtered, stats.action_failures), (3, 1, 0));
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.completed_flights, 1);
        assert!(!snapshot.in_flight);
        assert!(h
            .reporter
            .events()
            .iter()
            .any(|e| e.kind == ReportKind::Success && e.message.contains("offtopic offer")));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_flushes_single_pending_item() {
        let h = harness(
            5,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.enqueue(Item::new("lonely", "rust"));

        sleep(Duration::from_millis(2_900)).await;
        assert!(h.classifier.calls().is_empty());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(h.classifier.calls(), vec![ids(&["lonely"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_action_does_not_abort_batch() {
        let h = harness(
            5,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::failing(&["x2"]),
            "rust",
            None,
        );
        h.coordinator.enqueue_all(vec![
            Item::new("x1", "offtopic one"),
            Item::new("x2", "offtopic two"),
            Item::new("x3", "rust three"),
            Item::new("x4", "offtopic four"),
            Item::new("x5", "rust five"),
        ]);

        sleep(Duration::from_millis(100)).await;

        assert_eq!(h.actions.applied(), ids(&["x1", "x2", "x4"]));
        let stats = h.coordinator.stats();
        assert_eq!(stats.filtered, 3);
        assert_eq!(stats.action_failures, 1);
        assert_eq!(h.coordinator.snapshot().completed_flights, 1);
        assert!(h.reporter.errors().iter().any(|e| e.contains("x2")));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_interests_skip_classification_and_release_flight() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "",
            None,
        );
        assert!(h
            .reporter
            .errors()
            .iter()
            .any(|e| e.contains("no interests configured")));

        h.coordinator.enqueue_all(items("s", 2));
        sleep(Duration::from_millis(100)).await;

        assert!(h.classifier.calls().is_empty());
        assert!(h.actions.applied().is_empty());
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.completed_flights, 1);
        assert!(!snapshot.in_flight);
        assert!(h.reporter.errors().iter().any(|e| e.contains("batch skipped")));
    }

    #[tokio::test(start_paused = true)]
    async fn verdicts_arriving_after_stop_are_discarded() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic").with_delay(Duration::from_secs(2)),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.enqueue(Item::new("a", "offtopic a"));
        h.coordinator.enqueue(Item::new("b", "offtopic b"));

        sleep(Duration::from_millis(500)).await;
        assert!(h.coordinator.snapshot().in_flight);
        assert!(h.coordinator.stop());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(h.classifier.calls().len(), 1);
        assert!(h.actions.applied().is_empty());
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.pending, 0);
        assert!(!snapshot.in_flight);
        assert!(!snapshot.running);

        assert!(h.coordinator.start());
        assert!(h.coordinator.enqueue(Item::new("a", "offtopic a")));
        assert_eq!(h.coordinator.snapshot().pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_processed_one_at_a_time_in_order() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic").with_delay(Duration::from_millis(500)),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.enqueue_all(items("m", 7));

        sleep(Duration::from_secs(20)).await;

        assert_eq!(
            h.classifier.calls(),
            vec![
                ids(&["m1", "m2"]),
                ids(&["m3", "m4"]),
                ids(&["m5", "m6"]),
                ids(&["m7"]),
            ]
        );
        assert_eq!(h.classifier.max_concurrent(), 1);
        assert_eq!(h.coordinator.snapshot().completed_flights, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn next_batch_waits_for_delay() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.enqueue_all(items("d", 4));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(h.classifier.calls().len(), 1);

        sleep(Duration::from_millis(700)).await;
        assert_eq!(h.classifier.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_queue_refills_from_source() {
        let source = Arc::new(PagedSource::new(vec![items("r", 2)]));
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            Some(source.clone()),
        );
        h.coordinator.enqueue_all(items("a", 2));

        sleep(Duration::from_secs(20)).await;

        assert_eq!(
            h.classifier.calls(),
            vec![ids(&["a1", "a2"]), ids(&["r1", "r2"])]
        );
        assert_eq!(source.requests(), 2);
        let snapshot = h.coordinator.snapshot();
        assert!(!snapshot.stabilizing);
        assert!(!snapshot.refilling);
        assert!(h
            .reporter
            .events()
            .iter()
            .any(|e| e.message == "no new items available"));
    }

    #[tokio::test(start_paused = true)]
    async fn stabilizing_pauses_flushing_until_cleared() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            None,
        );
        h.coordinator.set_stabilizing(true);
        h.coordinator.enqueue_all(items("p", 2));

        sleep(Duration::from_secs(7)).await;
        assert!(h.classifier.calls().is_empty());
        assert_eq!(h.coordinator.snapshot().pending, 2);

        h.coordinator.set_stabilizing(false);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(h.classifier.calls(), vec![ids(&["p1", "p2"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_size_updates_are_validated() {
        let h = harness(
            3,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            None,
        );
        assert!(h.coordinator.set_batch_size(20).is_err());
        assert_eq!(h.coordinator.snapshot().batch_size, 3);
        assert!(h.coordinator.set_batch_size(2).is_ok());
        assert_eq!(h.coordinator.snapshot().batch_size, 2);
        assert_eq!(h.reporter.errors().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_transitions_are_idempotent() {
        let h = harness(
            3,
            ScriptedClassifier::new("offtopic").unconfigured(),
            RecordingActions::default(),
            "rust",
            None,
        );
        assert!(h
            .reporter
            .errors()
            .iter()
            .any(|e| e.contains("classifier not configured")));
        assert!(!h.coordinator.start());
        assert!(h.coordinator.stop());
        assert!(!h.coordinator.stop());
        assert!(!h.coordinator.enqueue(Item::new("late", "rust")));
    }

    #[tokio::test(start_paused = true)]
    async fn interest_updates_apply_to_next_batch() {
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "",
            None,
        );
        h.coordinator.set_interests(InterestSet::parse("rust"));
        h.coordinator.enqueue_all(items("i", 2));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(h.classifier.calls(), vec![ids(&["i1", "i2"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_interests_do_not_pull_more_items() {
        let source = Arc::new(PagedSource::new(vec![
            items("p", 2),
            items("q", 2),
            items("r", 2),
        ]));
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "",
            Some(source.clone()),
        );
        h.coordinator.enqueue_all(items("s", 2));

        sleep(Duration::from_secs(30)).await;

        assert_eq!(source.requests(), 0);
        assert!(h.classifier.calls().is_empty());
        assert_eq!(h.coordinator.snapshot().completed_flights, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn external_stabilizing_survives_a_refill() {
        let source = Arc::new(PagedSource::new(vec![items("r", 2)]));
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            Some(source.clone()),
        );
        h.coordinator.enqueue_all(items("a", 2));

        // refill fetched, settle delay still running
        sleep(Duration::from_millis(500)).await;
        assert!(h.coordinator.snapshot().refilling);
        h.coordinator.set_stabilizing(true);

        sleep(Duration::from_secs(5)).await;
        let snapshot = h.coordinator.snapshot();
        assert!(snapshot.stabilizing);
        assert!(!snapshot.refilling);
        assert_eq!(snapshot.pending, 2);
        assert_eq!(h.classifier.calls(), vec![ids(&["a1", "a2"])]);

        h.coordinator.set_stabilizing(false);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(
            h.classifier.calls(),
            vec![ids(&["a1", "a2"]), ids(&["r1", "r2"])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_slow_refill() {
        let source = Arc::new(
            PagedSource::new(vec![items("r", 2)]).with_delay(Duration::from_secs(60)),
        );
        let h = harness(
            2,
            ScriptedClassifier::new("offtopic"),
            RecordingActions::default(),
            "rust",
            Some(source.clone()),
        );
        h.coordinator.enqueue_all(items("a", 2));

        sleep(Duration::from_millis(100)).await;
        assert_eq!(source.requests(), 1);
        h.shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(10), h.dispatch)
            .await
            .expect("dispatch loop should stop during refill")
            .unwrap();
        assert!(!h.coordinator.snapshot().refilling);
    }
}
