// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local file tail with rotation handling.
//!
//! Rotation is detected by an inode change or the file shrinking below
//! the current offset; either resets the offset to zero and restarts
//! reading. A `notify` watcher shortens the idle wait between polls;
//! when it cannot be installed the source degrades to plain polling.

use crate::source::{split_lines, LogBatch, LogSource, LogSourceError};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

pub struct LocalSource {
    path: PathBuf,
    offset: u64,
    partial: String,
    #[cfg(unix)]
    inode: Option<u64>,
    change_rx: Option<mpsc::Receiver<()>>,
    /// Kept alive for the watcher's lifetime.
    _watcher: Option<RecommendedWatcher>,
}

impl LocalSource {
    /// Open a tail at `offset` (0 with `read_from_start`, otherwise
    /// the persisted offset).
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> Self {
        let path = path.into();
        let (watcher, change_rx) = match file_watcher(&path) {
            Ok(pair) => (Some(pair.0), Some(pair.1)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "file watcher unavailable, using polling only");
                (None, None)
            }
        };
        Self {
            path,
            offset,
            partial: String::new(),
            #[cfg(unix)]
            inode: None,
            change_rx,
            _watcher: watcher,
        }
    }

    #[cfg(unix)]
    fn current_inode(metadata: &std::fs::Metadata) -> Option<u64> {
        use std::os::unix::fs::MetadataExt;
        Some(metadata.ino())
    }

    fn detect_rotation(&mut self, metadata: &std::fs::Metadata) -> bool {
        let shrunk = metadata.len() < self.offset;
        #[cfg(unix)]
        {
            let inode = Self::current_inode(metadata);
            let changed = self.inode.is_some() && inode != self.inode;
            self.inode = inode;
            if changed || shrunk {
                return true;
            }
        }
        #[cfg(not(unix))]
        if shrunk {
            return true;
        }
        false
    }
}

fn file_watcher(
    path: &std::path::Path,
) -> Result<(RecommendedWatcher, mpsc::Receiver<()>), notify::Error> {
    let (tx, rx) = mpsc::channel(8);
    let mut watcher = notify::recommended_watcher(move |event: Result<notify::Event, _>| {
        if event.is_ok() {
            let _ = tx.try_send(());
        }
    })?;
    // Watch the parent so rotation (rename + recreate) is also seen.
    let target = path.parent().unwrap_or(path);
    watcher.watch(target, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

#[async_trait]
impl LogSource for LocalSource {
    async fn poll(&mut self) -> Result<LogBatch, LogSourceError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(m) => m,
            // The file may briefly not exist during rotation.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogBatch {
                    lines: vec![],
                    offset: self.offset,
                    rotated: false,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let rotated = self.detect_rotation(&metadata);
        if rotated {
            tracing::info!(path = %self.path.display(), "log rotation detected, restarting from 0");
            self.offset = 0;
            self.partial.clear();
        }

        if metadata.len() == self.offset {
            return Ok(LogBatch {
                lines: vec![],
                offset: self.offset,
                rotated,
            });
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::new();
        file.read_to_end(&mut chunk).await?;

        self.offset += chunk.len() as u64;
        let lines = split_lines(&mut self.partial, &String::from_utf8_lossy(&chunk));
        Ok(LogBatch {
            lines,
            offset: self.offset,
            rotated,
        })
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    async fn idle(&mut self, max_wait: Duration) {
        match &mut self.change_rx {
            Some(rx) => {
                let _ = tokio::time::timeout(max_wait, rx.recv()).await;
            }
            None => tokio::time::sleep(max_wait).await,
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
