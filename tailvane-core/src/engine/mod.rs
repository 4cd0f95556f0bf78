//! The engine: sole owner of all mutable daemon state.
//!
//! Watcher lines, client commands, heartbeats, named timers, and signals
//! all funnel into one event loop and are handled serially, so plugin
//! callbacks and persistence always observe consistent state.

pub mod timer;

use crate::persist;
use crate::plugin::{self, Counters, ParseErrorLevel, Plugin};
use crate::server::command::{self, Command, WipeTarget};
use crate::server::{self, ClientRequest, Reply};
use crate::settings::Settings;
use crate::watch::{expand, TailEvent, WatcherHandle};
use crate::zone::{WipeOutcome, ZoneStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use timer::NamedTimer;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

/// Log an unparsable line at the configured parse-error level.
macro_rules! parse_log {
    ($level:expr, $($fields:tt)*) => {
        match $level {
            ParseErrorLevel::Debug => debug!($($fields)*),
            ParseErrorLevel::Info => info!($($fields)*),
            ParseErrorLevel::Warn => warn!($($fields)*),
            ParseErrorLevel::Error => error!($($fields)*),
            ParseErrorLevel::None => {}
        }
    };
}

/// Run the daemon until a termination signal arrives.
pub async fn run(settings: Settings) -> Result<()> {
    let (_hold, shutdown) = watch::channel(false);
    run_with_shutdown(settings, shutdown).await
}

/// Run the daemon until a termination signal arrives or `shutdown` flips
/// to true. The final state snapshot is persisted before returning.
pub async fn run_with_shutdown(
    settings: Settings,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    settings.validate().context("invalid configuration")?;

    let plugin = plugin::build_plugin(&settings.plugin, &settings.plugin_options)
        .context("failed to load plugin")?;

    let snapshot = persist::load_snapshot(&settings.database)
        .context("cannot start with an unreadable state database")?;
    let mut store = ZoneStore::new(settings.active_zone_names());
    if let Some(snapshot) = snapshot {
        info!(
            database = %settings.database.display(),
            zones = snapshot.zones.len(),
            "state database loaded"
        );
        store.load(snapshot);
    }
    store.ensure_active();

    let listener = server::bind(settings.listen).await?;
    info!(
        listen = %settings.listen,
        plugin = %settings.plugin,
        identity = settings.identity.as_deref(),
        "listening"
    );

    let (tail_tx, tail_rx) = mpsc::channel(1024);
    let (request_tx, request_rx) = mpsc::channel(64);
    let acceptor = server::spawn_acceptor(listener, request_tx);

    let mut engine = Engine::new(settings, plugin, store, tail_tx);
    engine.init_zones();
    engine.expand();
    engine.arm_timers(Local::now());

    let result = engine.event_loop(tail_rx, request_rx, shutdown).await;

    // Graceful shutdown: persist, close the listener and clients, stop
    // every tail task.
    engine.save();
    acceptor.abort();
    engine.watchers.clear();
    info!("shutdown complete");
    result
}

struct Engine {
    settings: Settings,
    plugin: Box<dyn Plugin>,
    parse_error: ParseErrorLevel,
    store: ZoneStore,
    watchers: HashMap<PathBuf, WatcherHandle>,
    timers: Vec<NamedTimer>,
    tail_tx: mpsc::Sender<TailEvent>,
}

impl Engine {
    fn new(
        settings: Settings,
        plugin: Box<dyn Plugin>,
        store: ZoneStore,
        tail_tx: mpsc::Sender<TailEvent>,
    ) -> Self {
        let parse_error = settings
            .parse_error
            .unwrap_or_else(|| plugin.parse_error_default());
        Self {
            settings,
            plugin,
            parse_error,
            store,
            watchers: HashMap::new(),
            timers: Vec::new(),
            tail_tx,
        }
    }

    /// Seed every configured zone. Runs unconditionally after load;
    /// plugins keep `init_zone` idempotent.
    fn init_zones(&mut self) {
        for zone in self.store.active().to_vec() {
            if let Some(data) = self.store.get_mut(&zone) {
                let (public, private, windows) = data.parts_mut();
                if let Some(window) = windows.first_mut() {
                    self.plugin.init_zone(&zone, public, private, window);
                }
            }
        }
    }

    fn arm_timers(&mut self, now: DateTime<Local>) {
        self.timers = self
            .settings
            .timers
            .iter()
            .map(|spec| NamedTimer::arm(spec.clone(), now))
            .collect();
        for timer in &self.timers {
            debug!(zone = timer.spec.zone, name = timer.spec.name, next = %timer.next, "timer armed");
        }
    }

    async fn event_loop(
        &mut self,
        mut tail_rx: mpsc::Receiver<TailEvent>,
        mut request_rx: mpsc::Receiver<ClientRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut sighup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
        let mut sigusr1 =
            signal(SignalKind::user_defined1()).context("failed to install SIGUSR1 handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

        // The boot pass already expanded, so every heartbeat starts one
        // period out.
        let mut expand_tick = started_interval(self.settings.expand_period);
        let mut window_tick = started_interval(self.settings.window_size);
        let mut save_tick = started_interval(self.settings.store_period);

        loop {
            let timer_deadline = self.next_timer_deadline();
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown requested");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    break;
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received, re-expanding wildcards");
                    self.expand();
                }
                _ = sigusr1.recv() => {
                    info!("SIGUSR1 received; log reopening is handled by the logging backend");
                }
                _ = expand_tick.tick() => self.expand(),
                _ = window_tick.tick() => self.slide_windows(),
                _ = save_tick.tick() => self.save(),
                _ = tokio::time::sleep_until(timer_deadline), if !self.timers.is_empty() => {
                    self.fire_due_timers(Local::now());
                }
                Some(event) = tail_rx.recv() => self.handle_tail_event(event),
                Some(request) = request_rx.recv() => self.handle_request(request),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Wildcard expansion
    // ------------------------------------------------------------------

    /// Re-expand every zone's wildcards: create watchers for newly matching
    /// files, extend subscriptions in `multiple` mode, and drop watchers
    /// whose path no longer matches any zone.
    fn expand(&mut self) {
        let resolved = expand::resolve_zone_paths(
            &self.settings.zones,
            self.settings.change_dir.as_deref(),
        );
        let existing: HashSet<PathBuf> = resolved
            .iter()
            .flat_map(|(_, paths)| paths.iter().cloned())
            .collect();

        for (zone, paths) in &resolved {
            for path in paths {
                match self.watchers.get_mut(path) {
                    None => {
                        info!(zone, path = %path.display(), "watching file");
                        let handle =
                            WatcherHandle::spawn(path.clone(), zone.clone(), self.tail_tx.clone());
                        self.watchers.insert(path.clone(), handle);
                    }
                    Some(handle) if self.settings.multiple => handle.subscribe(zone),
                    // Default mode: the file is already claimed by an
                    // earlier zone.
                    Some(_) => {}
                }
            }
        }

        self.watchers.retain(|path, _| {
            let keep = existing.contains(path);
            if !keep {
                info!(path = %path.display(), "file no longer matches, dropping watcher");
            }
            keep
        });
    }

    // ------------------------------------------------------------------
    // Tail events
    // ------------------------------------------------------------------

    fn handle_tail_event(&mut self, event: TailEvent) {
        match event {
            TailEvent::Line { path, line } => self.handle_line(&path, &line),
            TailEvent::Error {
                path,
                syscall,
                errno,
                message,
            } => {
                error!(path = %path.display(), syscall, errno, %message, "watcher I/O error");
            }
        }
    }

    /// Route one complete line: parse once, account once per subscribed
    /// zone in subscription order.
    fn handle_line(&mut self, path: &PathBuf, line: &str) {
        let Some(handle) = self.watchers.get(path) else {
            return; // stale line from a watcher dropped this cycle
        };
        let zones = handle.zones.clone();

        match self.plugin.process_line(line) {
            Some(parsed) => {
                for zone in &zones {
                    if let Some(data) = self.store.get_mut(zone) {
                        let (public, private, windows) = data.parts_mut();
                        if let Some(window) = windows.first_mut() {
                            self.plugin.process_data(&parsed, public, private, window);
                        }
                    }
                }
            }
            None => parse_log!(self.parse_error, path = %path.display(), line, "unparsable line"),
        }
    }

    // ------------------------------------------------------------------
    // Heartbeats and timers
    // ------------------------------------------------------------------

    /// Window rollover for every active zone: the plugin sees the ring with
    /// the just-completed window at index 0, then a fresh empty window is
    /// prepended and the ring truncated.
    fn slide_windows(&mut self) {
        let windows_num = self.settings.windows_num;
        for zone in self.store.active().to_vec() {
            if let Some(data) = self.store.get_mut(&zone) {
                let (public, private, windows) = data.parts_mut();
                self.plugin.process_window(public, private, windows);
                windows.insert(0, Counters::new());
                windows.truncate(windows_num);
            }
        }
    }

    fn save(&mut self) {
        let snapshot = self.store.snapshot();
        if let Err(err) = persist::save_snapshot(&self.settings.database, &snapshot) {
            warn!(
                database = %self.settings.database.display(),
                error = format!("{err:#}"),
                "failed to persist state"
            );
        }
    }

    fn next_timer_deadline(&self) -> Instant {
        let Some(next) = self.timers.iter().map(|t| t.next).min() else {
            return Instant::now() + Duration::from_secs(3600);
        };
        let delta = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        Instant::now() + delta
    }

    fn fire_due_timers(&mut self, now: DateTime<Local>) {
        let mut index = 0;
        while index < self.timers.len() {
            if !self.timers[index].is_due(now) {
                index += 1;
                continue;
            }
            let zone = self.timers[index].spec.zone.clone();
            let name = self.timers[index].spec.name.clone();
            debug!(zone, name, "timer fired");

            let rearm = match self.store.get_mut(&zone) {
                Some(data) => {
                    let (public, private, windows) = data.parts_mut();
                    self.plugin.process_timer(&name, public, private, windows)
                }
                None => {
                    warn!(zone, name, "timer zone has no state, disarming");
                    false
                }
            };

            if rearm {
                self.timers[index].rearm(now);
                index += 1;
            } else {
                debug!(zone, name, "timer disarmed");
                self.timers.remove(index);
            }
        }
    }

    // ------------------------------------------------------------------
    // Client commands
    // ------------------------------------------------------------------

    fn handle_request(&mut self, request: ClientRequest) {
        let reply = match command::parse(&request.line) {
            Command::Zones => Reply::Lines(self.query_zones()),
            Command::Globs(zone) => Reply::Lines(self.query_globs(&zone)),
            Command::Files(zone) => Reply::Lines(self.query_files(&zone)),
            Command::Stats(zone) => Reply::Lines(self.query_state(&zone, false)),
            Command::Dump(zone) => Reply::Lines(self.query_state(&zone, true)),
            Command::Wipe(target) => Reply::Lines(vec![self.wipe(target)]),
            Command::Quit => Reply::Close,
            Command::Unknown => Reply::Lines(vec!["error".to_string()]),
        };
        // A dropped receiver just means the client went away mid-command.
        let _ = request.reply.send(reply);
    }

    fn query_zones(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .store
            .active()
            .iter()
            .map(|zone| format!("a:{zone}"))
            .collect();
        lines.extend(self.store.inactive().iter().map(|zone| format!("i:{zone}")));
        lines
    }

    fn query_globs(&self, zone: &str) -> Vec<String> {
        if !self.store.is_active(zone) {
            return vec!["no such active zone".to_string()];
        }
        let mut wildcards: Vec<String> = self
            .settings
            .zones
            .iter()
            .filter(|spec| spec.name == zone)
            .flat_map(|spec| spec.wildcards.iter().cloned())
            .collect();
        wildcards.sort();
        wildcards
    }

    fn query_files(&self, zone: &str) -> Vec<String> {
        if !self.store.is_active(zone) {
            return vec!["no such active zone".to_string()];
        }
        let mut entries: Vec<(&PathBuf, String)> = self
            .watchers
            .values()
            .filter(|handle| handle.is_subscribed(zone))
            .map(|handle| {
                let line = format!(
                    "{}:{}:{}",
                    handle.status.offset(),
                    handle.status.size(),
                    handle.path.display()
                );
                (&handle.path, line)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, line)| line).collect()
    }

    fn query_state(&self, zone: &str, dump: bool) -> Vec<String> {
        let Some(data) = self.store.get(zone) else {
            return vec!["no such zone".to_string()];
        };
        if dump {
            self.plugin
                .dump_zone(zone, &data.public, &data.private, data.completed())
        } else {
            self.plugin
                .stats_zone(zone, &data.public, &data.private, data.completed())
        }
    }

    fn wipe(&mut self, target: WipeTarget) -> String {
        let outcome = match target {
            WipeTarget::All => {
                let removed = self.store.wipe_all_inactive();
                info!(removed, "inactive zones wiped");
                WipeOutcome::Removed
            }
            WipeTarget::Zone(zone) => {
                let outcome = self.store.wipe(&zone);
                if outcome == WipeOutcome::Removed {
                    info!(zone, "inactive zone wiped");
                }
                outcome
            }
        };
        match outcome {
            WipeOutcome::Removed => {
                self.save();
                "ok".to_string()
            }
            WipeOutcome::ZoneIsActive => "zone is active".to_string(),
            WipeOutcome::NoSuchZone => "no such inactive zone".to_string(),
        }
    }
}

/// An interval whose first tick is one full period away (the boot pass has
/// already run).
fn started_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}
