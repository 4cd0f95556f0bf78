//! Named timers aligned to wall-clock unit boundaries.
//!
//! The next fire time is `now + period`, truncated downward to the timer's
//! unit, so a `zone:daily:1d` timer fires at local midnight and a
//! `zone:sweep:15m` timer fires on a whole minute.

use crate::settings::{TimerSpec, TruncUnit};
use chrono::{DateTime, Datelike, Days, Duration as ChronoDuration, Local, Timelike};

#[derive(Debug, Clone)]
pub struct NamedTimer {
    pub spec: TimerSpec,
    pub next: DateTime<Local>,
}

impl NamedTimer {
    pub fn arm(spec: TimerSpec, now: DateTime<Local>) -> Self {
        let next = next_fire(now, &spec);
        Self { spec, next }
    }

    pub fn rearm(&mut self, now: DateTime<Local>) {
        self.next = next_fire(now, &self.spec);
    }

    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.next <= now
    }
}

pub fn next_fire(now: DateTime<Local>, spec: &TimerSpec) -> DateTime<Local> {
    let period =
        ChronoDuration::from_std(spec.period).unwrap_or_else(|_| ChronoDuration::seconds(1));
    truncate(now + period, spec.unit)
}

fn truncate(ts: DateTime<Local>, unit: TruncUnit) -> DateTime<Local> {
    let naive = ts.naive_local();
    let truncated = match unit {
        TruncUnit::Second => naive.with_nanosecond(0),
        TruncUnit::Minute => naive.with_nanosecond(0).and_then(|t| t.with_second(0)),
        TruncUnit::Hour => naive
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_minute(0)),
        TruncUnit::Day => naive.date().and_hms_opt(0, 0, 0),
        TruncUnit::Week => {
            let monday = naive
                .date()
                .checked_sub_days(Days::new(u64::from(naive.weekday().num_days_from_monday())));
            monday.and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    };
    match truncated {
        // On a DST fold, take the earlier of the two local readings.
        Some(naive) => naive
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or(ts),
        None => ts,
    }
}
