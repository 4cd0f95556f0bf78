//! File watching: rotation-aware tail readers and wildcard expansion.

pub mod expand;
pub mod tailer;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events a tail task sends to the engine.
#[derive(Debug)]
pub enum TailEvent {
    /// One complete line, terminator stripped.
    Line { path: Arc<PathBuf>, line: String },
    /// Unrecoverable I/O failure; the watcher stays in place and retries.
    Error {
        path: Arc<PathBuf>,
        syscall: &'static str,
        errno: i32,
        message: String,
    },
}

/// Read position and file size, shared with the engine for the `files`
/// query.
#[derive(Debug, Default)]
pub struct WatcherStatus {
    offset: AtomicU64,
    size: AtomicU64,
}

impl WatcherStatus {
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_offset(&self, offset: u64) {
        self.offset.store(offset, Ordering::Relaxed);
    }

    pub(crate) fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Relaxed);
    }
}

/// An engine-owned watcher: one canonical path, the zones subscribed to it
/// in subscription order, and the tail task following the file.
#[derive(Debug)]
pub struct WatcherHandle {
    pub path: PathBuf,
    pub zones: Vec<String>,
    pub status: Arc<WatcherStatus>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Spawn a tail task for `path`, initially subscribed by `zone`.
    pub fn spawn(path: PathBuf, zone: String, events: mpsc::Sender<TailEvent>) -> Self {
        let status = Arc::new(WatcherStatus::default());
        let task = tailer::spawn(path.clone(), Arc::clone(&status), events);
        Self {
            path,
            zones: vec![zone],
            status,
            task,
        }
    }

    /// Append a zone to the subscription list if not already present.
    pub fn subscribe(&mut self, zone: &str) {
        if !self.zones.iter().any(|z| z == zone) {
            self.zones.push(zone.to_string());
        }
    }

    pub fn is_subscribed(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z == zone)
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
