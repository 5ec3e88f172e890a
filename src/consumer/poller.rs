//! Fixed-interval feed polling.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use magnetcast_common::{Error, EventBus, EventPayload, Result};
use magnetcast_playlist::FeedSnapshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::scheduler::SchedulerHandle;
use super::timeline::{MergeOutcome, Reconciler, Timeline};

/// Where the feed is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Http(Url),
    File(PathBuf),
}

impl FeedSource {
    /// Fetch the current feed text.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<String> {
        match self {
            FeedSource::Http(url) => {
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| Error::Http(e.to_string()))?;
                response.text().await.map_err(|e| Error::Http(e.to_string()))
            }
            FeedSource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
        }
    }

    /// Gateway root for an HTTP feed: the feed URL's origin.
    pub fn gateway(&self) -> Option<Url> {
        match self {
            FeedSource::Http(url) => url.join("/").ok(),
            FeedSource::File(_) => None,
        }
    }
}

impl FromStr for FeedSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| Error::Config(format!("feed URL {s:?}: {e}")))?;
            Ok(FeedSource::Http(url))
        } else if s.is_empty() {
            Err(Error::Config("empty feed source".into()))
        } else {
            Ok(FeedSource::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Http(url) => write!(f, "{url}"),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Polls a feed, reconciles it, and hands deltas to the scheduler.
pub struct FeedPoller {
    source: FeedSource,
    client: reqwest::Client,
    interval: Duration,
    reconciler: Reconciler,
    scheduler: SchedulerHandle,
    events: Option<Arc<EventBus>>,
}

impl FeedPoller {
    pub fn new(source: FeedSource, interval: Duration, scheduler: SchedulerHandle) -> Self {
        Self {
            source,
            client: reqwest::Client::new(),
            interval,
            reconciler: Reconciler::new(),
            scheduler,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn timeline(&self) -> &Timeline {
        self.reconciler.timeline()
    }

    /// Fetch and merge once.
    pub async fn poll_once(&mut self) -> Result<MergeOutcome> {
        let text = self.source.fetch(&self.client).await?;
        let snapshot = FeedSnapshot::parse(&text)?;

        let init_before = self.reconciler.timeline().init_magnet.clone();
        let outcome = self.reconciler.merge(snapshot.entries());
        let init_changed = self.reconciler.timeline().init_magnet != init_before;

        match &outcome {
            MergeOutcome::Advanced { new } => {
                tracing::debug!(
                    new_segments = new.len(),
                    total = self.reconciler.timeline().magnets.len(),
                    "Timeline advanced"
                );
                self.broadcast(EventPayload::TimelineAdvanced {
                    new_segments: new.len(),
                    total: self.reconciler.timeline().magnets.len(),
                });
            }
            MergeOutcome::Gap { new } => {
                self.broadcast(EventPayload::TimelineGap {
                    new_segments: new.len(),
                });
            }
            MergeOutcome::Settled | MergeOutcome::Unchanged => {}
        }

        let delta = self.reconciler.delta(&outcome);
        if !delta.entries.is_empty() || init_changed {
            self.scheduler.timeline(delta);
        }

        Ok(outcome)
    }

    /// Poll until cancelled. The first poll happens immediately.
    pub async fn run(mut self, cancel: CancellationToken) -> Timeline {
        tracing::info!(source = %self.source, "Polling feed");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.poll_once().await {
                tracing::warn!(source = %self.source, "Feed poll failed: {}", e);
            }
        }

        self.reconciler.timeline().clone()
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::scheduler::SchedulerEvent;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_sources() {
        assert_eq!(
            "http://host:8080/stream.magnets".parse::<FeedSource>().unwrap(),
            FeedSource::Http(Url::parse("http://host:8080/stream.magnets").unwrap())
        );
        assert_eq!(
            "./live/stream.magnets".parse::<FeedSource>().unwrap(),
            FeedSource::File(PathBuf::from("./live/stream.magnets"))
        );
        assert!("".parse::<FeedSource>().is_err());
    }

    #[test]
    fn gateway_is_feed_origin() {
        let source: FeedSource = "http://host:8080/feeds/stream.magnets".parse().unwrap();
        assert_eq!(source.gateway().unwrap().as_str(), "http://host:8080/");
        let file: FeedSource = "/tmp/stream.magnets".parse().unwrap();
        assert!(file.gateway().is_none());
    }

    #[tokio::test]
    async fn poll_sends_deltas_and_init() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream.magnets"))
            .respond_with(ResponseTemplate::new(200).set_body_string("init\n"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stream.magnets"))
            .respond_with(ResponseTemplate::new(200).set_body_string("init\nA\nB\n"))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let source: FeedSource = format!("{}/stream.magnets", server.uri()).parse().unwrap();
        let mut poller = FeedPoller::new(source, Duration::from_secs(1), SchedulerHandle::new(tx));

        assert_eq!(poller.poll_once().await.unwrap(), MergeOutcome::Unchanged);
        match rx.try_recv() {
            Ok(SchedulerEvent::Timeline(delta)) => {
                assert_eq!(delta.init, Some("init".parse().unwrap()));
                assert!(delta.entries.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.new_magnets().len(), 2);
        match rx.try_recv() {
            Ok(SchedulerEvent::Timeline(delta)) => assert_eq!(delta.entries.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(poller.poll_once().await.unwrap(), MergeOutcome::Settled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let server = MockServer::start().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let source: FeedSource = format!("{}/stream.magnets", server.uri()).parse().unwrap();
        let mut poller = FeedPoller::new(source, Duration::from_secs(1), SchedulerHandle::new(tx));
        assert!(matches!(poller.poll_once().await, Err(Error::Http(_))));
    }
}
