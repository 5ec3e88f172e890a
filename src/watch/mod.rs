//! Directory mode: wait for the live playlist to appear.

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Whether `path` names a file matching the playlist pattern.
pub fn is_playlist(path: &Path, pattern: &Regex) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| pattern.is_match(name))
}

/// Return the first playlist in `dir`, waiting for one to be created if none
/// exists yet. Returns `None` if cancelled first.
///
/// This is a one-shot handoff: later matches are ignored.
pub async fn await_playlist(
    dir: &Path,
    pattern: &Regex,
    cancel: &CancellationToken,
) -> Result<Option<PathBuf>> {
    let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(100);

    let filter = pattern.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_create() || event.kind.is_modify() {
                    for path in event.paths {
                        if is_playlist(&path, &filter) {
                            let _ = event_tx.blocking_send(path);
                        }
                    }
                }
            }
        },
        Config::default(),
    )
    .context("Failed to create directory watcher")?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch directory: {:?}", dir))?;

    // Watch first, then scan, so a playlist created in between is not missed.
    if let Some(existing) = scan(dir, pattern)? {
        tracing::info!("Found playlist: {:?}", existing);
        return Ok(Some(existing));
    }

    tracing::info!("Waiting for a playlist in {:?}", dir);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(None),
            event = event_rx.recv() => match event {
                Some(path) if path.is_file() => {
                    tracing::info!("Playlist appeared: {:?}", path);
                    return Ok(Some(path));
                }
                Some(_) => {}
                None => anyhow::bail!("Directory watcher stopped unexpectedly"),
            },
        }
    }
}

fn scan(dir: &Path, pattern: &Regex) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_playlist(path, pattern))
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pattern() -> Regex {
        Regex::new(r"\.m3u8$").unwrap()
    }

    #[test]
    fn matches_on_file_name_only() {
        assert!(is_playlist(Path::new("/live/stream.m3u8"), &pattern()));
        assert!(!is_playlist(Path::new("/live.m3u8/seg0.m4s"), &pattern()));
    }

    #[tokio::test]
    async fn finds_existing_playlist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seg0.m4s"), b"x").unwrap();
        std::fs::write(dir.path().join("b.m3u8"), b"#EXTM3U").unwrap();
        std::fs::write(dir.path().join("a.m3u8"), b"#EXTM3U").unwrap();

        let found = await_playlist(dir.path(), &pattern(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(found, Some(dir.path().join("a.m3u8")));
    }

    #[tokio::test]
    async fn waits_for_new_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("live.m3u8");
        let writer_target = target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            std::fs::write(writer_target, b"#EXTM3U\n").unwrap();
        });

        let found = tokio::time::timeout(
            Duration::from_secs(10),
            await_playlist(dir.path(), &pattern(), &CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.map(|p| p.file_name().unwrap().to_owned()), Some("live.m3u8".into()));
    }

    #[tokio::test]
    async fn cancelled_wait_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let found = await_playlist(dir.path(), &pattern(), &cancel).await.unwrap();
        assert!(found.is_none());
    }
}
