//! Shared fixtures for integration tests.
//!
//! [`LiveDir`] is a temporary directory holding a live playlist and its
//! segment files, laid out the way a segmenter would write them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use magnetcast::config::Config;
use magnetcast::publisher::Publisher;
use magnetcast::server::{self, AppContext};
use magnetcast_common::EventBus;
use magnetcast_content::{ContentPublisher, LocalSwarm};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

pub struct LiveDir {
    pub dir: TempDir,
}

impl LiveDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.path().join("stream.m3u8")
    }

    pub fn feed_path(&self) -> PathBuf {
        self.path().join("stream.magnets")
    }

    /// Write a segment file whose bytes are derived from its name.
    pub fn write_segment(&self, name: &str) -> Vec<u8> {
        let body = format!("payload of {name}").repeat(64).into_bytes();
        std::fs::write(self.path().join(name), &body).expect("failed to write segment");
        body
    }

    /// Write a playlist with an init map followed by `segments`.
    pub fn write_playlist(&self, init: &str, segments: &[&str]) {
        let mut text = format!("#EXTM3U\n#EXT-X-VERSION:7\n#EXT-X-MAP:URI=\"{init}\"\n");
        for segment in segments {
            text.push_str("#EXTINF:2.000,\n");
            text.push_str(segment);
            text.push('\n');
        }
        std::fs::write(self.playlist_path(), text).expect("failed to write playlist");
    }

    pub fn read_feed(&self) -> Option<String> {
        std::fs::read_to_string(self.feed_path()).ok()
    }

    pub fn publisher(&self, provider: Arc<dyn ContentPublisher>, config: &Config) -> Publisher {
        Publisher::new(
            provider,
            self.playlist_path(),
            config,
            Arc::new(EventBus::default()),
        )
    }
}

/// Config with a small piece length so test segments span several pieces.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.publisher.piece_length = 256;
    config.publisher.interval_ms = 50;
    config.consumer.poll_interval_ms = 50;
    config
}

/// Poll `cond` every 10ms for up to two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// A gateway serving a [`LiveDir`]'s feed and a swarm on an ephemeral port.
pub struct Gateway {
    pub base_url: Url,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Gateway {
    pub async fn start(live: &LiveDir, swarm: Arc<LocalSwarm>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");
        let events = Arc::new(EventBus::default());
        let ctx = AppContext {
            swarm,
            events: events.clone(),
            feed_path: live.feed_path(),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server::serve(listener, ctx, cancel.clone()));

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("valid base url"),
            events,
            cancel,
            task,
        }
    }

    pub fn feed_url(&self) -> Url {
        self.base_url.join("stream.magnets").expect("valid feed url")
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        self.task
            .await
            .expect("gateway task panicked")
            .expect("gateway failed");
    }
}
