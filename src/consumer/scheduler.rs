//! Ordered delivery scheduler.
//!
//! The scheduler is an actor. Timeline deltas, retrieval completions and sink
//! signals all arrive as [`SchedulerEvent`]s on one channel, and only the
//! actor loop touches the delivery queue and the `busy` flag. That is what
//! keeps at most one append outstanding.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use magnetcast_common::{ContentId, EventBus, EventPayload, Result};
use magnetcast_content::{ContentFetcher, ProgressSender, RetrieveOptions};
use tokio::sync::mpsc;

use super::sink::AppendSink;
use super::timeline::TimelineDelta;
use crate::config::{ConsumerConfig, DeliveryOrder};

/// Input to the scheduler actor.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// New work from the reconciler.
    Timeline(TimelineDelta),
    /// The initialization payload finished retrieving.
    InitRetrieved {
        content_id: ContentId,
        result: Result<Bytes>,
    },
    /// Backoff after a failed initialization attempt has elapsed.
    InitRetry,
    /// A steady-state payload finished retrieving.
    Retrieved {
        position: usize,
        content_id: ContentId,
        result: Result<Bytes>,
    },
    /// The sink can accept appends.
    SinkReady,
    /// The sink finished its outstanding append.
    SinkIdle,
    /// Stop the actor.
    Shutdown,
}

/// Cloneable sender for [`SchedulerEvent`]s.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl SchedulerHandle {
    pub fn new(tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        Self { tx }
    }

    /// Post an event. Returns false once the scheduler has stopped.
    pub fn post(&self, event: SchedulerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn timeline(&self, delta: TimelineDelta) -> bool {
        self.post(SchedulerEvent::Timeline(delta))
    }

    pub fn sink_ready(&self) {
        self.post(SchedulerEvent::SinkReady);
    }

    pub fn sink_idle(&self) {
        self.post(SchedulerEvent::SinkIdle);
    }

    pub fn shutdown(&self) {
        self.post(SchedulerEvent::Shutdown);
    }
}

/// Retrieval and ordering policy.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub order: DeliveryOrder,
    /// Extra attempts after a failed retrieval.
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&ConsumerConfig::default())
    }
}

impl From<&ConsumerConfig> for SchedulerOptions {
    fn from(config: &ConsumerConfig) -> Self {
        Self {
            order: config.delivery_order,
            retries: config.retrieval_retries,
            retry_delay: config.retry_delay(),
            timeout: config.retrieval_timeout(),
        }
    }
}

/// Counters reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub appended: usize,
    pub dropped: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub init_appended: bool,
}

pub struct Scheduler {
    fetcher: Arc<dyn ContentFetcher>,
    sink: Box<dyn AppendSink>,
    options: SchedulerOptions,
    tx: mpsc::UnboundedSender<SchedulerEvent>,
    rx: mpsc::UnboundedReceiver<SchedulerEvent>,
    events: Option<Arc<EventBus>>,

    queue: VecDeque<Bytes>,
    busy: bool,
    sink_ready: bool,
    init_magnet: Option<ContentId>,
    init_requested: bool,
    init_done: bool,
    requested: HashSet<ContentId>,
    in_flight: usize,

    // Feed ordering only.
    outstanding: BTreeSet<usize>,
    completed: BTreeMap<usize, Option<Bytes>>,

    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        sink: Box<dyn AppendSink>,
        options: SchedulerOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            sink,
            options,
            tx,
            rx,
            events: None,
            queue: VecDeque::new(),
            busy: false,
            sink_ready: false,
            init_magnet: None,
            init_requested: false,
            init_done: false,
            requested: HashSet::new(),
            in_flight: 0,
            outstanding: BTreeSet::new(),
            completed: BTreeMap::new(),
            stats: SchedulerStats::default(),
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(self.tx.clone())
    }

    /// Attach the sink and process events until [`SchedulerEvent::Shutdown`].
    pub async fn run(mut self) -> SchedulerStats {
        tracing::debug!(order = ?self.options.order, "Scheduler started");
        let handle = self.handle();
        self.sink.attach(handle);

        while let Some(event) = self.rx.recv().await {
            if matches!(event, SchedulerEvent::Shutdown) {
                break;
            }
            self.handle_event(event);
        }

        let stats = self.snapshot_stats();
        tracing::info!(
            appended = stats.appended,
            dropped = stats.dropped,
            queued = stats.queued,
            in_flight = stats.in_flight,
            "Scheduler stopped"
        );
        stats
    }

    fn snapshot_stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.queue.len(),
            in_flight: self.in_flight,
            init_appended: self.init_done,
            ..self.stats
        }
    }

    fn handle_event(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::Timeline(delta) => {
                if let Some(init) = delta.init {
                    if self.init_magnet.as_ref() != Some(&init) && !self.init_done {
                        self.init_magnet = Some(init);
                    }
                }
                self.maybe_start_init();
                for (position, content_id) in delta.entries {
                    self.start_retrieval(position, content_id);
                }
            }
            SchedulerEvent::InitRetrieved { content_id, result } => match result {
                Ok(payload) => {
                    self.init_requested = false;
                    self.append_init(payload);
                }
                Err(e) => {
                    tracing::warn!(
                        content_id = %content_id,
                        "Initialization segment retrieval failed, will retry: {}",
                        e
                    );
                    self.schedule_init_retry();
                }
            },
            SchedulerEvent::InitRetry => {
                self.init_requested = false;
                self.maybe_start_init();
            }
            SchedulerEvent::Retrieved {
                position,
                content_id,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let payload = match result {
                    Ok(payload) => {
                        tracing::debug!(content_id = %content_id, bytes = payload.len(), "Segment retrieved");
                        self.broadcast(EventPayload::SegmentRetrieved {
                            content_id,
                            bytes: payload.len(),
                        });
                        Some(payload)
                    }
                    Err(e) => {
                        tracing::warn!(content_id = %content_id, "Dropping segment: {}", e);
                        self.stats.dropped += 1;
                        self.broadcast(EventPayload::SegmentDropped {
                            content_id,
                            error: e.to_string(),
                        });
                        None
                    }
                };
                self.enqueue(position, payload);
            }
            SchedulerEvent::SinkReady => {
                self.sink_ready = true;
                self.maybe_start_init();
            }
            SchedulerEvent::SinkIdle => {
                self.busy = false;
            }
            SchedulerEvent::Shutdown => {}
        }

        self.drain();
    }

    fn maybe_start_init(&mut self) {
        if self.init_done || self.init_requested || !self.sink_ready {
            return;
        }
        let Some(init) = self.init_magnet.clone() else {
            return;
        };

        self.init_requested = true;
        let fetcher = self.fetcher.clone();
        let options = self.options.clone();
        let handle = self.handle();
        tokio::spawn(async move {
            let result = retrieve_with_retry(fetcher.as_ref(), &init, &options).await;
            handle.post(SchedulerEvent::InitRetrieved {
                content_id: init,
                result,
            });
        });
    }

    /// Re-attempt the initialization segment after `retry_delay`, without
    /// waiting for another timeline delta. `init_requested` stays set until
    /// then so a delta arriving meanwhile does not start a second attempt.
    fn schedule_init_retry(&mut self) {
        self.init_requested = true;
        let delay = self.options.retry_delay;
        let handle = self.handle();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.post(SchedulerEvent::InitRetry);
        });
    }

    fn append_init(&mut self, payload: Bytes) {
        if self.init_done {
            return;
        }
        let bytes = payload.len();
        self.busy = true;
        match self.sink.append(payload) {
            Ok(()) => {
                self.init_done = true;
                tracing::info!(bytes, "Initialization segment appended");
                self.broadcast(EventPayload::SegmentAppended { bytes, init: true });
            }
            Err(e) => {
                self.busy = false;
                tracing::warn!("Sink rejected initialization segment, will retry: {}", e);
                self.schedule_init_retry();
            }
        }
    }

    fn start_retrieval(&mut self, position: usize, content_id: ContentId) {
        if !self.requested.insert(content_id.clone()) {
            return;
        }
        self.in_flight += 1;
        if self.options.order == DeliveryOrder::Feed {
            self.outstanding.insert(position);
        }

        let fetcher = self.fetcher.clone();
        let options = self.options.clone();
        let handle = self.handle();
        tokio::spawn(async move {
            let result = retrieve_with_retry(fetcher.as_ref(), &content_id, &options).await;
            handle.post(SchedulerEvent::Retrieved {
                position,
                content_id,
                result,
            });
        });
    }

    fn enqueue(&mut self, position: usize, payload: Option<Bytes>) {
        match self.options.order {
            DeliveryOrder::Completion => {
                if let Some(payload) = payload {
                    self.queue.push_back(payload);
                }
            }
            DeliveryOrder::Feed => {
                self.outstanding.remove(&position);
                self.completed.insert(position, payload);
                // Release everything ahead of the earliest retrieval still running.
                let horizon = self.outstanding.first().copied();
                while let Some(entry) = self.completed.first_entry() {
                    if horizon.is_some_and(|h| *entry.key() > h) {
                        break;
                    }
                    if let Some(payload) = entry.remove() {
                        self.queue.push_back(payload);
                    }
                }
            }
        }
    }

    fn drain(&mut self) {
        while !self.queue.is_empty() && !self.busy && self.init_done {
            if self.sink.is_busy() {
                tracing::warn!(
                    queued = self.queue.len(),
                    "Sink reports busy while the scheduler considers it idle"
                );
            }

            let position = self.sink.current_position();
            if let Some(range) = self
                .sink
                .buffered_ranges()
                .into_iter()
                .find(|r| r.start > position)
            {
                tracing::debug!(from = position, to = range.start, "Skipping forward over gap");
                self.sink.set_current_position(range.start);
            }

            let Some(payload) = self.queue.pop_front() else {
                break;
            };
            let bytes = payload.len();
            self.busy = true;
            match self.sink.append(payload) {
                Ok(()) => {
                    self.stats.appended += 1;
                    self.broadcast(EventPayload::SegmentAppended { bytes, init: false });
                }
                Err(e) => {
                    self.busy = false;
                    self.stats.dropped += 1;
                    tracing::error!("Sink rejected segment: {}", e);
                }
            }
        }
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

async fn retrieve_with_retry(
    fetcher: &dyn ContentFetcher,
    content_id: &ContentId,
    options: &SchedulerOptions,
) -> Result<Bytes> {
    let retrieve = RetrieveOptions {
        timeout: options.timeout,
        progress: Some(ProgressSender::new(|id, progress| {
            tracing::trace!(content_id = %id, received = progress.received, "Retrieval progress");
        })),
    };

    let mut attempt = 0;
    loop {
        match fetcher.retrieve(content_id, &retrieve).await {
            Ok(payload) => return Ok(payload),
            Err(e) if attempt < options.retries => {
                attempt += 1;
                tracing::debug!(content_id = %content_id, attempt, "Retrying retrieval: {}", e);
                tokio::time::sleep(options.retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
