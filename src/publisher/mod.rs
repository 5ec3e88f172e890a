//! Playlist publisher.
//!
//! Every tick the publisher reads the live playlist, resolves each entry to a
//! content identifier and, when every entry resolved, atomically replaces the
//! feed file with the new snapshot.

pub mod resolver;
pub mod window;

pub use resolver::{sidecar_path, Resolution, SegmentResolver};
pub use window::{SeedingSession, SeedingWindow};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use magnetcast_common::{Error, EventBus, EventPayload, Result};
use magnetcast_content::ContentPublisher;
use magnetcast_playlist::{FeedSnapshot, LivePlaylist};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Result of one publish cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new snapshot was written.
    Published { segments: usize },
    /// The playlist was empty or had no entries.
    Skipped,
    /// Every entry resolved to the snapshot already on disk.
    Unchanged,
    /// Something failed; the previous snapshot is still in place.
    Aborted { error: String },
}

pub struct Publisher {
    playlist_path: PathBuf,
    feed_path: PathBuf,
    interval: Duration,
    resolver: SegmentResolver,
    window: SeedingWindow,
    events: Arc<EventBus>,
    last_published: Option<FeedSnapshot>,
}

impl Publisher {
    /// Publisher for `playlist_path`, writing the feed next to it under the
    /// configured feed name.
    pub fn new(
        provider: Arc<dyn ContentPublisher>,
        playlist_path: PathBuf,
        config: &Config,
        events: Arc<EventBus>,
    ) -> Self {
        let feed_path = playlist_path.with_file_name(&config.publisher.feed_name);
        let window = SeedingWindow::new(config.window.max_sessions, provider.clone())
            .with_events(events.clone());
        Self {
            playlist_path,
            feed_path,
            interval: config.publisher.interval(),
            resolver: SegmentResolver::new(provider),
            window,
            events,
            last_published: None,
        }
    }

    pub fn feed_path(&self) -> &Path {
        &self.feed_path
    }

    pub fn playlist_path(&self) -> &Path {
        &self.playlist_path
    }

    pub fn resolver(&self) -> &SegmentResolver {
        &self.resolver
    }

    pub fn window(&self) -> &SeedingWindow {
        &self.window
    }

    /// Publish on every tick until `cancel` fires, then tear down the window.
    ///
    /// Cycles run strictly one after another; ticks missed while a cycle is
    /// still resolving are skipped.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            playlist = %self.playlist_path.display(),
            feed = %self.feed_path.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Publisher started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Publish cycle interrupted");
                    break;
                }
                outcome = self.run_cycle() => {
                    tracing::trace!(?outcome, "Publish cycle finished");
                }
            }
        }

        self.window.shutdown().await;
        tracing::info!("Publisher stopped");
    }

    /// Run a single publish cycle.
    pub async fn run_cycle(&mut self) -> PublishOutcome {
        match self.cycle().await {
            Ok(outcome) => {
                if let PublishOutcome::Published { segments } = outcome {
                    self.events
                        .broadcast(EventPayload::CyclePublished { segments });
                }
                outcome
            }
            Err(e) => {
                tracing::warn!("Publish cycle aborted: {}", e);
                self.events.broadcast(EventPayload::CycleAborted {
                    error: e.to_string(),
                });
                PublishOutcome::Aborted {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn cycle(&mut self) -> Result<PublishOutcome> {
        let text = tokio::fs::read_to_string(&self.playlist_path)
            .await
            .map_err(|e| {
                Error::playlist(format!("{}: {e}", self.playlist_path.display()))
            })?;
        if text.trim().is_empty() {
            return Ok(PublishOutcome::Skipped);
        }

        let playlist = LivePlaylist::parse(&text)?;
        if playlist.is_empty() {
            return Ok(PublishOutcome::Skipped);
        }

        let base = self
            .playlist_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let paths: Vec<PathBuf> = playlist
            .entries
            .iter()
            .map(|entry| base.join(&entry.uri))
            .collect();

        let prepared = try_join_all(paths.iter().map(|p| self.resolver.prepare(p))).await?;
        let ids = self
            .resolver
            .commit(paths.into_iter().zip(prepared).collect(), &mut self.window)
            .await?;

        let snapshot = FeedSnapshot::new(ids);
        if self.last_published.as_ref() == Some(&snapshot) {
            return Ok(PublishOutcome::Unchanged);
        }

        write_atomic(&self.feed_path, snapshot.render()).await?;
        let segments = snapshot.len();
        tracing::debug!(segments, feed = %self.feed_path.display(), "Published feed snapshot");
        self.last_published = Some(snapshot);

        Ok(PublishOutcome::Published { segments })
    }
}

/// Replace `path` with `contents` via a temporary file in the same directory
/// and a rename, so readers see either the old or the new file.
pub async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        std::io::Write::write_all(&mut tmp, contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::from(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("feed writer task failed: {e}")))?
}
