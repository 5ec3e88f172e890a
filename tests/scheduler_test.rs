//! Delivery scheduler: single-flight appends, init ordering and feed
//! re-sequencing under out-of-order retrieval.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::wait_until;
use magnetcast::config::DeliveryOrder;
use magnetcast::consumer::{MemorySink, Scheduler, SchedulerOptions, TimelineDelta};
use magnetcast_common::{ContentId, Error, Result};
use magnetcast_content::{ContentFetcher, RetrieveOptions};
use tokio::sync::Semaphore;

/// Each retrieval blocks until the test opens its gate.
struct GatedFetcher {
    payloads: HashMap<ContentId, (Bytes, Arc<Semaphore>)>,
    completed: AtomicUsize,
}

impl GatedFetcher {
    fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            payloads: names
                .iter()
                .map(|n| {
                    let payload = Bytes::from(n.to_uppercase());
                    (n.parse().unwrap(), (payload, Arc::new(Semaphore::new(0))))
                })
                .collect(),
            completed: AtomicUsize::new(0),
        })
    }

    fn open(&self, name: &str) {
        let id: ContentId = name.parse().unwrap();
        self.payloads[&id].1.add_permits(1);
    }

    fn open_all(&self) {
        for (_, gate) in self.payloads.values() {
            gate.add_permits(1);
        }
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for GatedFetcher {
    async fn retrieve(&self, id: &ContentId, _options: &RetrieveOptions) -> Result<Bytes> {
        let (payload, gate) = self
            .payloads
            .get(id)
            .ok_or_else(|| Error::retrieval(id, "unknown identifier"))?;
        let _permit = gate
            .acquire()
            .await
            .map_err(|e| Error::retrieval(id, e))?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(payload.clone())
    }
}

fn delta(init: &str, entries: &[&str]) -> TimelineDelta {
    TimelineDelta {
        init: Some(init.parse().unwrap()),
        entries: entries
            .iter()
            .enumerate()
            .map(|(pos, id)| (pos, id.parse().unwrap()))
            .collect(),
    }
}

fn bodies(sink: &MemorySink) -> Vec<String> {
    sink.appended()
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect()
}

#[tokio::test]
async fn next_append_waits_for_idle_signal() {
    let fetcher = GatedFetcher::new(&["init", "a", "b", "c"]);
    fetcher.open_all();
    let sink = MemorySink::manual();
    let scheduler = Scheduler::new(fetcher.clone(), Box::new(sink.clone()), SchedulerOptions::default());
    let handle = scheduler.handle();
    let task = tokio::spawn(scheduler.run());

    sink.set_ready();
    handle.timeline(delta("init", &["a", "b", "c"]));
    wait_until(|| fetcher.completed() == 4).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Everything is retrieved, but only the init append has been issued.
    assert_eq!(sink.append_count(), 1);

    for expected in 2..=4 {
        sink.finish_append();
        wait_until(|| sink.append_count() == expected).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.append_count(), expected);
    }

    assert_eq!(sink.overlapping_appends(), 0);
    handle.shutdown();
    let stats = task.await.unwrap();
    assert_eq!(stats.appended, 3);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn init_is_appended_before_faster_segments() {
    let fetcher = GatedFetcher::new(&["init", "a", "b"]);
    let sink = MemorySink::new();
    let scheduler = Scheduler::new(fetcher.clone(), Box::new(sink.clone()), SchedulerOptions::default());
    let handle = scheduler.handle();
    let task = tokio::spawn(scheduler.run());

    handle.timeline(delta("init", &["a", "b"]));
    fetcher.open("a");
    fetcher.open("b");
    wait_until(|| fetcher.completed() == 2).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(sink.append_count(), 0);

    fetcher.open("init");
    wait_until(|| sink.append_count() == 3).await;
    assert_eq!(bodies(&sink)[0], "INIT");

    handle.shutdown();
    assert!(task.await.unwrap().init_appended);
}

#[tokio::test]
async fn sink_not_ready_defers_init() {
    let fetcher = GatedFetcher::new(&["init", "a"]);
    fetcher.open_all();
    let sink = MemorySink::manual();
    let scheduler = Scheduler::new(fetcher.clone(), Box::new(sink.clone()), SchedulerOptions::default());
    let handle = scheduler.handle();
    let task = tokio::spawn(scheduler.run());

    handle.timeline(delta("init", &["a"]));
    wait_until(|| fetcher.completed() == 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    // Only the segment was fetched; init waits for the sink.
    assert_eq!(sink.append_count(), 0);

    sink.set_ready();
    wait_until(|| sink.append_count() == 1).await;
    sink.finish_append();
    wait_until(|| sink.append_count() == 2).await;
    assert_eq!(bodies(&sink), ["INIT", "A"]);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn feed_order_resequences_out_of_order_completions() {
    let fetcher = GatedFetcher::new(&["init", "a", "b", "c"]);
    fetcher.open("init");
    let sink = MemorySink::new();
    let options = SchedulerOptions {
        order: DeliveryOrder::Feed,
        ..SchedulerOptions::default()
    };
    let scheduler = Scheduler::new(fetcher.clone(), Box::new(sink.clone()), options);
    let handle = scheduler.handle();
    let task = tokio::spawn(scheduler.run());

    handle.timeline(delta("init", &["a", "b", "c"]));
    wait_until(|| sink.append_count() == 1).await;

    fetcher.open("c");
    fetcher.open("b");
    wait_until(|| fetcher.completed() == 3).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(sink.append_count(), 1);

    fetcher.open("a");
    wait_until(|| sink.append_count() == 4).await;
    assert_eq!(bodies(&sink), ["INIT", "A", "B", "C"]);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn completion_order_delivers_as_retrieved() {
    let fetcher = GatedFetcher::new(&["init", "a", "b", "c"]);
    fetcher.open("init");
    let sink = MemorySink::new();
    let scheduler = Scheduler::new(fetcher.clone(), Box::new(sink.clone()), SchedulerOptions::default());
    let handle = scheduler.handle();
    let task = tokio::spawn(scheduler.run());

    handle.timeline(delta("init", &["a", "b", "c"]));
    wait_until(|| sink.append_count() == 1).await;

    for (name, count) in [("c", 2), ("a", 3), ("b", 4)] {
        fetcher.open(name);
        wait_until(|| sink.append_count() == count).await;
    }
    assert_eq!(bodies(&sink), ["INIT", "C", "A", "B"]);

    handle.shutdown();
    task.await.unwrap();
}
