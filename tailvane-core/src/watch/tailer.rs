//! The per-file tail task.
//!
//! Polls the path on a short interval, reading newly appended bytes and
//! emitting complete lines. Rotation is detected by comparing the path's
//! inode/device against the open file's, or by the size dropping below the
//! read offset; on rotation the path is re-opened first and read from
//! offset 0 in the same cycle, so lines written to the new file before the
//! next poll are never lost.

use crate::watch::{TailEvent, WatcherStatus};
use std::fs::{File, Metadata};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn spawn(path: PathBuf, status: Arc<WatcherStatus>, events: mpsc::Sender<TailEvent>) -> JoinHandle<()> {
    let tailer = Tailer {
        path: Arc::new(path),
        open: None,
        offset: 0,
        partial: Vec::new(),
        status,
        events,
    };
    tokio::spawn(tailer.run())
}

struct OpenFile {
    file: File,
    ino: u64,
    dev: u64,
}

/// The engine side of the channel went away; the task exits.
struct EngineGone;

struct Tailer {
    path: Arc<PathBuf>,
    open: Option<OpenFile>,
    offset: u64,
    partial: Vec<u8>,
    status: Arc<WatcherStatus>,
    events: mpsc::Sender<TailEvent>,
}

impl Tailer {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.poll().await.is_err() {
                return;
            }
        }
    }

    async fn poll(&mut self) -> Result<(), EngineGone> {
        let meta = match std::fs::metadata(&*self.path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // Rotated away with no replacement yet; wait for it.
                return Ok(());
            }
            Err(err) => return self.report("stat", err).await,
        };
        self.status.set_size(meta.len());

        match &self.open {
            None => {
                // Fresh watcher: start at the file's current end.
                if let Err(err) = self.reopen(meta.len()) {
                    return self.report("open", err).await;
                }
            }
            Some(open) if needs_reopen(open, &meta, self.offset) => {
                info!(path = %self.path.display(), "rolled over");
                self.partial.clear();
                if let Err(err) = self.reopen(0) {
                    return self.report("open", err).await;
                }
            }
            Some(_) => {}
        }

        self.read_appended().await
    }

    /// Open the path and seek to `offset`. Inode and device are taken from
    /// the opened handle, not the path, so a rotation racing the open is
    /// caught on the next poll.
    fn reopen(&mut self, offset: u64) -> std::io::Result<()> {
        let mut file = File::open(&*self.path)?;
        let meta = file.metadata()?;
        let offset = offset.min(meta.len());
        file.seek(SeekFrom::Start(offset))?;
        self.open = Some(OpenFile {
            file,
            ino: meta.ino(),
            dev: meta.dev(),
        });
        self.offset = offset;
        self.status.set_offset(offset);
        debug!(path = %self.path.display(), offset, "tail opened");
        Ok(())
    }

    async fn read_appended(&mut self) -> Result<(), EngineGone> {
        let mut buf = [0u8; 8192];
        loop {
            let Some(open) = self.open.as_mut() else {
                return Ok(());
            };
            match open.file.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    self.offset += n as u64;
                    self.status.set_offset(self.offset);
                    self.partial.extend_from_slice(&buf[..n]);
                    for line in drain_lines(&mut self.partial) {
                        self.send(TailEvent::Line {
                            path: Arc::clone(&self.path),
                            line,
                        })
                        .await?;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return self.report("read", err).await,
            }
        }
    }

    async fn report(&mut self, syscall: &'static str, err: std::io::Error) -> Result<(), EngineGone> {
        self.send(TailEvent::Error {
            path: Arc::clone(&self.path),
            syscall,
            errno: err.raw_os_error().unwrap_or(0),
            message: err.to_string(),
        })
        .await
    }

    async fn send(&mut self, event: TailEvent) -> Result<(), EngineGone> {
        self.events.send(event).await.map_err(|_| EngineGone)
    }
}

fn needs_reopen(open: &OpenFile, meta: &Metadata, offset: u64) -> bool {
    open.ino != meta.ino() || open.dev != meta.dev() || meta.len() < offset
}

/// Remove complete lines from the buffer, leaving any trailing partial
/// line in place. Terminators are stripped; bytes decode lossily.
fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(pos) = buf[start..].iter().position(|b| *b == b'\n') {
        let end = start + pos;
        lines.push(String::from_utf8_lossy(&buf[start..end]).into_owned());
        start = end + 1;
    }
    buf.drain(..start);
    lines
}
