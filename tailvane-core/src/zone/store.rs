//! The zone store: every zone's state, keyed by name, with active zones
//! iterated in configuration order.

use crate::persist::Snapshot;
use crate::zone::ZoneData;
use std::collections::HashMap;

/// Result of a `wipe` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    Removed,
    ZoneIsActive,
    NoSuchZone,
}

pub struct ZoneStore {
    /// Active zone names in configuration order.
    active: Vec<String>,
    zones: HashMap<String, ZoneData>,
}

impl ZoneStore {
    pub fn new(active: Vec<String>) -> Self {
        Self {
            active,
            zones: HashMap::new(),
        }
    }

    /// Adopt a persisted snapshot as the initial per-zone state. Snapshot
    /// zones that are not configured become inactive zones.
    pub fn load(&mut self, snapshot: Snapshot) {
        self.zones = snapshot.zones.into_iter().collect();
    }

    /// Make sure every active zone exists and satisfies the window-ring
    /// invariant (at least one window).
    pub fn ensure_active(&mut self) {
        for name in &self.active {
            let data = self.zones.entry(name.clone()).or_default();
            if data.windows.is_empty() {
                data.windows.push(Default::default());
            }
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|z| z == name)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Inactive zone names, sorted.
    pub fn inactive(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .zones
            .keys()
            .filter(|name| !self.is_active(name))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Option<&ZoneData> {
        self.zones.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ZoneData> {
        self.zones.get_mut(name)
    }

    /// Remove a zone iff it is inactive.
    pub fn wipe(&mut self, name: &str) -> WipeOutcome {
        if self.is_active(name) {
            return WipeOutcome::ZoneIsActive;
        }
        match self.zones.remove(name) {
            Some(_) => WipeOutcome::Removed,
            None => WipeOutcome::NoSuchZone,
        }
    }

    /// Remove every inactive zone; returns how many were removed.
    pub fn wipe_all_inactive(&mut self) -> usize {
        let before = self.zones.len();
        let active = std::mem::take(&mut self.active);
        self.zones.retain(|name, _| active.iter().any(|z| z == name));
        self.active = active;
        before - self.zones.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            zones: self
                .zones
                .iter()
                .map(|(name, data)| (name.clone(), data.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Counters;

    fn store_with(active: &[&str]) -> ZoneStore {
        let mut store = ZoneStore::new(active.iter().map(|s| s.to_string()).collect());
        store.ensure_active();
        store
    }

    #[test]
    fn ensure_creates_one_empty_window() {
        let store = store_with(&["a", "b"]);
        let data = store.get("a").unwrap();
        assert_eq!(data.windows.len(), 1);
        assert!(data.public.is_empty());
        assert!(data.private.is_empty());
    }

    #[test]
    fn active_order_is_configuration_order() {
        let store = store_with(&["web", "mail", "av"]);
        assert_eq!(store.active(), &["web", "mail", "av"]);
    }

    #[test]
    fn snapshot_zones_become_inactive_when_not_configured() {
        let mut old = store_with(&["a"]);
        old.get_mut("a").unwrap().public.insert("hits".into(), 3.0);

        let mut fresh = ZoneStore::new(vec!["b".to_string()]);
        fresh.load(old.snapshot());
        fresh.ensure_active();

        assert_eq!(fresh.inactive(), vec!["a"]);
        assert!(fresh.is_active("b"));
        assert_eq!(fresh.get("a").unwrap().public["hits"], 3.0);
    }

    #[test]
    fn wipe_refuses_active_and_unknown_zones() {
        let mut store = store_with(&["a"]);
        assert_eq!(store.wipe("a"), WipeOutcome::ZoneIsActive);
        assert_eq!(store.wipe("ghost"), WipeOutcome::NoSuchZone);
    }

    #[test]
    fn wipe_removes_inactive_zone() {
        let mut store = ZoneStore::new(vec!["b".to_string()]);
        let mut snapshot = Snapshot::default();
        snapshot.zones.insert("a".to_string(), ZoneData::default());
        store.load(snapshot);
        store.ensure_active();

        assert_eq!(store.wipe("a"), WipeOutcome::Removed);
        assert!(store.get("a").is_none());
        assert_eq!(store.wipe("a"), WipeOutcome::NoSuchZone);
    }

    #[test]
    fn wipe_all_inactive_keeps_active_zones() {
        let mut store = ZoneStore::new(vec!["keep".to_string()]);
        let mut snapshot = Snapshot::default();
        snapshot.zones.insert("old1".to_string(), ZoneData::default());
        snapshot.zones.insert("old2".to_string(), ZoneData::default());
        store.load(snapshot);
        store.ensure_active();

        assert_eq!(store.wipe_all_inactive(), 2);
        assert!(store.get("keep").is_some());
        assert!(store.inactive().is_empty());
    }

    #[test]
    fn completed_windows_exclude_the_current_one() {
        let mut store = store_with(&["a"]);
        let data = store.get_mut("a").unwrap();
        assert!(data.completed().is_empty());

        let mut done = Counters::new();
        done.insert("hits".into(), 5.0);
        data.windows.insert(0, Counters::new());
        data.windows[1] = done;
        assert_eq!(data.completed().len(), 1);
        assert_eq!(data.completed()[0]["hits"], 5.0);
    }
}
