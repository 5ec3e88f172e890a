//! Consumer side: poll the feed, reconcile it into a timeline, and deliver
//! payloads to a sink in order.

pub mod poller;
pub mod scheduler;
pub mod sink;
pub mod timeline;

pub use poller::{FeedPoller, FeedSource};
pub use scheduler::{
    Scheduler, SchedulerEvent, SchedulerHandle, SchedulerOptions, SchedulerStats,
};
pub use sink::{AppendSink, BufferedRange, FileSink, MemorySink};
pub use timeline::{MergeOutcome, Reconciler, Timeline, TimelineDelta};

use std::sync::Arc;

use magnetcast_common::EventBus;
use magnetcast_content::ContentFetcher;
use tokio_util::sync::CancellationToken;

use crate::config::ConsumerConfig;

/// Run one consumer session until `cancel` fires.
///
/// The fetcher is owned by the session and shared only with its scheduler.
pub async fn run_consumer(
    source: FeedSource,
    fetcher: Arc<dyn ContentFetcher>,
    sink: Box<dyn AppendSink>,
    config: &ConsumerConfig,
    events: Option<Arc<EventBus>>,
    cancel: CancellationToken,
) -> SchedulerStats {
    let mut scheduler = Scheduler::new(fetcher, sink, SchedulerOptions::from(config));
    if let Some(events) = &events {
        scheduler = scheduler.with_events(events.clone());
    }
    let handle = scheduler.handle();
    let scheduler_task = tokio::spawn(scheduler.run());

    let mut poller = FeedPoller::new(source, config.poll_interval(), handle.clone());
    if let Some(events) = events {
        poller = poller.with_events(events);
    }
    let timeline = poller.run(cancel).await;
    tracing::info!(segments = timeline.magnets.len(), "Feed polling stopped");

    handle.shutdown();
    match scheduler_task.await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Scheduler task failed: {}", e);
            SchedulerStats::default()
        }
    }
}
