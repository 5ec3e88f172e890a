//! Segment path to content identifier resolution.
//!
//! Resolution is split in two so a publish cycle stays all-or-nothing:
//! [`SegmentResolver::prepare`] builds artifacts without touching any state,
//! and [`SegmentResolver::commit`] seeds the whole batch first, then persists
//! sidecars, admits sessions and extends the cache.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use magnetcast_common::{ContentId, Result};
use magnetcast_content::{Artifact, ContentPublisher, SeedHandle};

use super::window::{SeedingSession, SeedingWindow};

const SIDECAR_EXTENSION: &str = "magnet";

/// Outcome of the side-effect-free half of a resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Already mapped in this process.
    Cached(ContentId),
    /// Identifier loaded from the segment's sidecar file.
    Sidecar(ContentId),
    /// Newly built artifact, not yet seeded.
    Fresh {
        artifact: Artifact,
        content_id: ContentId,
    },
}

impl Resolution {
    pub fn content_id(&self) -> &ContentId {
        match self {
            Resolution::Cached(id) | Resolution::Sidecar(id) => id,
            Resolution::Fresh { content_id, .. } => content_id,
        }
    }
}

/// Path of the sidecar holding the identifier of `segment`.
pub fn sidecar_path(segment: &Path) -> PathBuf {
    let mut name = segment
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    segment.with_file_name(name)
}

/// Caches `path -> ContentId` for the lifetime of the process. Entries are
/// never evicted.
pub struct SegmentResolver {
    provider: Arc<dyn ContentPublisher>,
    cache: HashMap<PathBuf, ContentId>,
}

impl SegmentResolver {
    pub fn new(provider: Arc<dyn ContentPublisher>) -> Self {
        Self {
            provider,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self, path: &Path) -> Option<&ContentId> {
        self.cache.get(path)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Look the path up, or build its artifact. Has no side effects.
    pub async fn prepare(&self, path: &Path) -> Result<Resolution> {
        if let Some(id) = self.cache.get(path) {
            return Ok(Resolution::Cached(id.clone()));
        }

        if let Some(id) = read_sidecar(path).await {
            tracing::debug!(path = %path.display(), "Reusing identifier from sidecar");
            return Ok(Resolution::Sidecar(id));
        }

        let artifact = self.provider.create_artifact(path).await?;
        let content_id = self.provider.to_identifier(&artifact)?;
        Ok(Resolution::Fresh {
            artifact,
            content_id,
        })
    }

    /// Apply prepared resolutions in order and return their identifiers.
    ///
    /// Every fresh artifact in the batch is seeded before anything else is
    /// touched. If one fails, the sessions started so far are stopped and the
    /// error is returned with no sidecar, window or cache change. Otherwise
    /// fresh artifacts get a sidecar and are admitted into `window`.
    /// A path that repeats within one batch is committed once.
    pub async fn commit(
        &mut self,
        batch: Vec<(PathBuf, Resolution)>,
        window: &mut SeedingWindow,
    ) -> Result<Vec<ContentId>> {
        let mut handles: Vec<Option<SeedHandle>> = Vec::with_capacity(batch.len());
        let mut seen = HashSet::new();

        for (path, resolution) in &batch {
            let artifact = match resolution {
                Resolution::Fresh { artifact, .. }
                    if !self.cache.contains_key(path) && seen.insert(path) =>
                {
                    artifact
                }
                _ => {
                    handles.push(None);
                    continue;
                }
            };

            match self.provider.seed(artifact).await {
                Ok(handle) => handles.push(Some(handle)),
                Err(e) => {
                    for handle in handles.iter().flatten() {
                        self.provider.stop_seeding(handle).await;
                    }
                    tracing::warn!(
                        path = %path.display(),
                        "Seeding failed, rolled back {} session(s)",
                        handles.iter().flatten().count()
                    );
                    return Err(e);
                }
            }
        }
        drop(seen);

        let mut ids = Vec::with_capacity(batch.len());
        for ((path, resolution), handle) in batch.into_iter().zip(handles) {
            if let Some(id) = self.cache.get(&path) {
                ids.push(id.clone());
                continue;
            }

            let id = match (resolution, handle) {
                (
                    Resolution::Fresh {
                        artifact,
                        content_id,
                    },
                    Some(handle),
                ) => {
                    write_sidecar(&path, &content_id).await;
                    window.admit(SeedingSession::new(path.clone(), handle)).await;
                    tracing::info!(
                        path = %path.display(),
                        info_hash = %artifact.info_hash,
                        "Resolved new segment"
                    );
                    content_id
                }
                (resolution, _) => resolution.content_id().clone(),
            };

            self.cache.insert(path, id.clone());
            ids.push(id);
        }

        Ok(ids)
    }

    /// Resolve a single path, committing immediately.
    pub async fn resolve(&mut self, path: &Path, window: &mut SeedingWindow) -> Result<ContentId> {
        let resolution = self.prepare(path).await?;
        let mut ids = self
            .commit(vec![(path.to_path_buf(), resolution)], window)
            .await?;
        ids.pop()
            .ok_or_else(|| magnetcast_common::Error::internal("empty resolution batch"))
    }
}

async fn read_sidecar(segment: &Path) -> Option<ContentId> {
    let sidecar = sidecar_path(segment);
    let text = match tokio::fs::read_to_string(&sidecar).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %sidecar.display(), "Failed to read sidecar: {}", e);
            return None;
        }
    };

    match text.parse::<ContentId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(path = %sidecar.display(), "Ignoring invalid sidecar: {}", e);
            None
        }
    }
}

async fn write_sidecar(segment: &Path, id: &ContentId) {
    let sidecar = sidecar_path(segment);
    if let Err(e) = tokio::fs::write(&sidecar, format!("{id}\n")).await {
        tracing::warn!(path = %sidecar.display(), "Failed to write sidecar: {}", e);
    }
}
