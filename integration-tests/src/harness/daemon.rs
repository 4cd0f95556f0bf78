//! Spawn a daemon in-process on a dynamic port and talk to it over TCP.

use crate::harness::init_test_tracing;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tailvane_core::plugin::options::PluginOptions;
use tailvane_core::settings::{assemble_zones, Settings};
use tokio::sync::watch;

/// Global port allocator; nextest-safe.
static NEXT_PORT: AtomicU16 = AtomicU16::new(21_000);

fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Handle to a running tailvane test daemon.
pub struct TestDaemon {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    thread: Option<thread::JoinHandle<anyhow::Result<()>>>,
}

impl TestDaemon {
    /// Start a daemon for `plugin` with the given `-o` options string and
    /// `[zone:]wildcard` arguments. Windows slide and state persists every
    /// second so scenarios run quickly.
    pub fn start(plugin: &str, options: &str, zone_args: &[String], database: &Path) -> Self {
        init_test_tracing();

        let port = next_port();
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();

        let zones = assemble_zones(zone_args, "log", false).expect("bad zone args");
        let mut settings = Settings::new(plugin, zones);
        settings.database = database.to_path_buf();
        settings.listen = addr;
        settings.window_size = Duration::from_secs(1);
        settings.store_period = Duration::from_secs(1);
        settings.plugin_options = PluginOptions::parse(options);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("failed to build test runtime");
            runtime.block_on(tailvane_core::run_with_shutdown(settings, shutdown_rx))
        });

        wait_for_listener(addr);

        Self {
            addr,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Send one command and return the raw reply bytes, CRLF terminators
    /// included. A trailing `quit` closes the reply stream.
    pub fn send_raw(&self, command: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).expect("connect to daemon");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
            .write_all(format!("{command}\nquit\n").as_bytes())
            .expect("send command");
        let mut raw = String::new();
        stream.read_to_string(&mut raw).expect("read reply");
        raw
    }

    /// Send one command and return the reply as lines.
    pub fn send(&self, command: &str) -> Vec<String> {
        self.send_raw(command)
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Clean shutdown: the final state snapshot is on disk when this
    /// returns.
    pub fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .expect("daemon thread panicked")
                .expect("daemon exited with an error");
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Poll until the daemon accepts connections (or panic).
fn wait_for_listener(addr: SocketAddr) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match TcpStream::connect(addr) {
            Ok(_) => return,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(25)),
            Err(err) => panic!("daemon failed to listen at {addr}: {err}"),
        }
    }
}

/// Append newline-terminated lines to a log file.
pub fn append_lines(path: &Path, lines: &[String]) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .expect("open log file");
    for line in lines {
        writeln!(file, "{line}").expect("append log line");
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
