//! Per-zone accumulator state: public counters, plugin scratch, and the
//! bounded ring of time windows.

mod store;

pub use store::{WipeOutcome, ZoneStore};

use crate::plugin::{Counters, Scratch};
use serde::{Deserialize, Serialize};

/// State for one zone. `windows[0]` is the currently-accumulating window;
/// the tail holds completed windows, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    #[serde(default)]
    pub public: Counters,
    #[serde(default)]
    pub private: Scratch,
    #[serde(default)]
    pub windows: Vec<Counters>,
}

impl ZoneData {
    /// Disjoint mutable borrows for plugin callbacks.
    pub fn parts_mut(&mut self) -> (&mut Counters, &mut Scratch, &mut Vec<Counters>) {
        (&mut self.public, &mut self.private, &mut self.windows)
    }

    /// Completed windows only; the in-progress `windows[0]` is excluded.
    pub fn completed(&self) -> &[Counters] {
        if self.windows.len() > 1 {
            &self.windows[1..]
        } else {
            &[]
        }
    }
}
