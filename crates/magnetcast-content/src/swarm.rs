//! In-process seeding registry.
//!
//! [`LocalSwarm`] is the publisher's stand-in for a peer engine: seeding an
//! artifact registers its info dictionary and source path, and the gateway
//! serves whatever is currently registered. Stopping a seed makes the
//! artifact unreachable again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use magnetcast_common::{ContentId, Error, Result};

use crate::artifact::{Artifact, InfoHash, DEFAULT_PIECE_LENGTH};
use crate::magnet::Magnet;
use crate::provider::{ContentPublisher, SeedHandle};

/// A registered artifact.
#[derive(Debug, Clone)]
pub struct SeededArtifact {
    pub info: Bytes,
    pub source: PathBuf,
    pub length: u64,
}

/// Seeding registry shared between the publisher and the gateway.
#[derive(Debug)]
pub struct LocalSwarm {
    seeded: DashMap<InfoHash, SeededArtifact>,
    piece_length: u64,
}

impl LocalSwarm {
    pub fn new(piece_length: u64) -> Self {
        Self {
            seeded: DashMap::new(),
            piece_length,
        }
    }

    /// Bencoded info dictionary of a seeded artifact.
    pub fn info(&self, hash: &InfoHash) -> Option<Bytes> {
        self.seeded.get(hash).map(|entry| entry.info.clone())
    }

    pub fn get(&self, hash: &InfoHash) -> Option<SeededArtifact> {
        self.seeded.get(hash).map(|entry| entry.value().clone())
    }

    pub fn is_seeding(&self, hash: &InfoHash) -> bool {
        self.seeded.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.seeded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeded.is_empty()
    }
}

impl Default for LocalSwarm {
    fn default() -> Self {
        Self::new(DEFAULT_PIECE_LENGTH)
    }
}

#[async_trait]
impl ContentPublisher for LocalSwarm {
    async fn create_artifact(&self, path: &Path) -> Result<Artifact> {
        let path_owned = path.to_path_buf();
        let piece_length = self.piece_length;
        tokio::task::spawn_blocking(move || Artifact::build(&path_owned, piece_length))
            .await
            .map_err(|e| Error::artifact(path, format!("hashing task failed: {e}")))?
    }

    fn to_identifier(&self, artifact: &Artifact) -> Result<ContentId> {
        Magnet::new(artifact.info_hash, Some(artifact.info.name.clone())).to_content_id()
    }

    async fn seed(&self, artifact: &Artifact) -> Result<SeedHandle> {
        let content_id = self.to_identifier(artifact)?;
        self.seeded.insert(
            artifact.info_hash,
            SeededArtifact {
                info: Bytes::from(artifact.info.encode()),
                source: artifact.source.clone(),
                length: artifact.info.length,
            },
        );
        tracing::debug!(
            info_hash = %artifact.info_hash,
            source = %artifact.source.display(),
            "Seeding artifact"
        );
        Ok(SeedHandle {
            info_hash: artifact.info_hash,
            content_id,
        })
    }

    async fn stop_seeding(&self, handle: &SeedHandle) {
        if self.seeded.remove(&handle.info_hash).is_some() {
            tracing::debug!(info_hash = %handle.info_hash, "Stopped seeding artifact");
        }
    }
}
