//! Content provider capabilities.
//!
//! The peer-to-peer engine is an external collaborator. The publisher talks to
//! it through [`ContentPublisher`] and the consumer through
//! [`ContentFetcher`]; everything else in magnetcast is written against these
//! traits.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use magnetcast_common::{ContentId, Result};

use crate::artifact::{Artifact, InfoHash};

/// Handle for one active seeding registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedHandle {
    pub info_hash: InfoHash,
    pub content_id: ContentId,
}

/// Publisher-side capability: build, identify, seed, unseed.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Build a distributable artifact for the file at `path`.
    ///
    /// Fails with [`Error::ArtifactCreation`](magnetcast_common::Error::ArtifactCreation).
    async fn create_artifact(&self, path: &Path) -> Result<Artifact>;

    /// Canonical identifier for an artifact, without tracker hints.
    fn to_identifier(&self, artifact: &Artifact) -> Result<ContentId>;

    /// Start offering the artifact's bytes to peers.
    async fn seed(&self, artifact: &Artifact) -> Result<SeedHandle>;

    /// Stop offering a previously seeded artifact.
    async fn stop_seeding(&self, handle: &SeedHandle);
}

/// Progress report for a running retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl RetrievalProgress {
    /// Fraction complete in `0.0..=1.0`, when the total is known.
    pub fn fraction(&self) -> Option<f32> {
        self.total
            .filter(|&t| t > 0)
            .map(|t| (self.received as f32 / t as f32).min(1.0))
    }
}

/// Callback receiving retrieval progress.
#[derive(Clone)]
pub struct ProgressSender {
    callback: Arc<dyn Fn(&ContentId, RetrievalProgress) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(&ContentId, RetrievalProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn send(&self, id: &ContentId, progress: RetrievalProgress) {
        (self.callback)(id, progress);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Options for a single retrieval.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Abort the retrieval after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressSender>,
}

/// Consumer-side capability: fetch a payload by identifier.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Retrieve and verify the payload for `id`.
    ///
    /// Fails with [`Error::Retrieval`](magnetcast_common::Error::Retrieval).
    async fn retrieve(&self, id: &ContentId, options: &RetrieveOptions) -> Result<Bytes>;
}
