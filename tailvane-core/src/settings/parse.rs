//! Parsing of the `[zone:]wildcard` positionals and `--timer` specs.

use crate::settings::{SettingsError, TimerSpec, TruncUnit, ZoneSpec};
use std::path::Path;
use std::time::Duration;

/// Zone name grammar: `[A-Za-z0-9_-]+`.
pub fn is_zone_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Identity grammar: word characters only.
pub fn is_identity(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Group `[zone:]wildcard` arguments into per-zone specs, preserving
/// configuration order. Bare wildcards land in the aggregate zone, or in a
/// zone derived from the pattern's file stem when `basename` is set.
pub fn assemble_zones(
    args: &[String],
    aggregate: &str,
    basename: bool,
) -> Result<Vec<ZoneSpec>, SettingsError> {
    let mut zones: Vec<ZoneSpec> = Vec::new();

    for arg in args {
        let (name, pattern) = match arg.split_once(':') {
            Some((prefix, rest)) if is_zone_name(prefix) && !rest.is_empty() => {
                (prefix.to_string(), rest.to_string())
            }
            _ if basename => (zone_from_basename(arg), arg.clone()),
            _ => (aggregate.to_string(), arg.clone()),
        };

        if !is_zone_name(&name) {
            return Err(SettingsError::InvalidZoneName { name });
        }

        match zones.iter_mut().find(|z| z.name == name) {
            Some(zone) => zone.wildcards.push(pattern),
            None => zones.push(ZoneSpec {
                name,
                wildcards: vec![pattern],
            }),
        }
    }

    Ok(zones)
}

/// Derive a zone name from a wildcard's file stem, mapping characters
/// outside the zone grammar to underscores.
fn zone_from_basename(pattern: &str) -> String {
    let stem = Path::new(pattern)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Parse a `zone:name:N[wdhms]` timer spec.
pub fn parse_timer_spec(spec: &str) -> Result<TimerSpec, SettingsError> {
    let invalid = |reason: &'static str| SettingsError::InvalidTimer {
        spec: spec.to_string(),
        reason,
    };

    let mut parts = spec.splitn(3, ':');
    let zone = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let duration = parts.next().ok_or_else(|| invalid("expected zone:name:N[wdhms]"))?;

    if !is_zone_name(zone) {
        return Err(invalid("invalid zone name"));
    }
    if name.is_empty() {
        return Err(invalid("empty timer name"));
    }

    let unit = match duration.chars().last() {
        Some('s') => TruncUnit::Second,
        Some('m') => TruncUnit::Minute,
        Some('h') => TruncUnit::Hour,
        Some('d') => TruncUnit::Day,
        Some('w') => TruncUnit::Week,
        _ => return Err(invalid("duration must end in one of [wdhms]")),
    };
    let count: u64 = duration[..duration.len() - 1]
        .parse()
        .map_err(|_| invalid("duration count is not a number"))?;
    if count == 0 {
        return Err(invalid("duration count must be positive"));
    }

    Ok(TimerSpec {
        zone: zone.to_string(),
        name: name.to_string(),
        period: Duration::from_secs(count * unit.seconds()),
        unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_zone_prefix_is_split_off() {
        let zones = assemble_zones(&args(&["web:/var/log/httpd/*.log"]), "log", false).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "web");
        assert_eq!(zones[0].wildcards, vec!["/var/log/httpd/*.log"]);
    }

    #[test]
    fn bare_wildcard_goes_to_aggregate_zone() {
        let zones = assemble_zones(&args(&["/var/log/maillog"]), "mail", false).unwrap();
        assert_eq!(zones[0].name, "mail");
        assert_eq!(zones[0].wildcards, vec!["/var/log/maillog"]);
    }

    #[test]
    fn repeated_zone_collects_wildcards_in_order() {
        let zones = assemble_zones(
            &args(&["a:/tmp/one.log", "b:/tmp/two.log", "a:/tmp/three.log"]),
            "log",
            false,
        )
        .unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].name, "a");
        assert_eq!(zones[0].wildcards, vec!["/tmp/one.log", "/tmp/three.log"]);
        assert_eq!(zones[1].name, "b");
    }

    #[test]
    fn basename_mode_derives_zone_from_file_stem() {
        let zones = assemble_zones(&args(&["/var/log/access.log"]), "log", true).unwrap();
        assert_eq!(zones[0].name, "access");
    }

    #[test]
    fn a_pattern_with_a_slash_is_never_a_zone_prefix() {
        // The prefix before ':' contains '/', which the zone grammar rejects,
        // so the whole argument is a wildcard.
        let zones = assemble_zones(&args(&["/odd/dir:name/x.log"]), "log", false).unwrap();
        assert_eq!(zones[0].name, "log");
        assert_eq!(zones[0].wildcards, vec!["/odd/dir:name/x.log"]);
    }

    #[test]
    fn timer_spec_parses_units() {
        let timer = parse_timer_spec("a:daily:1d").unwrap();
        assert_eq!(timer.zone, "a");
        assert_eq!(timer.name, "daily");
        assert_eq!(timer.period, Duration::from_secs(86_400));
        assert_eq!(timer.unit, TruncUnit::Day);

        let timer = parse_timer_spec("mail:sweep:15m").unwrap();
        assert_eq!(timer.period, Duration::from_secs(900));
        assert_eq!(timer.unit, TruncUnit::Minute);
    }

    #[test]
    fn timer_spec_rejects_garbage() {
        assert!(parse_timer_spec("a:daily").is_err());
        assert!(parse_timer_spec("a::1d").is_err());
        assert!(parse_timer_spec("a:daily:d").is_err());
        assert!(parse_timer_spec("a:daily:0d").is_err());
        assert!(parse_timer_spec("a:daily:5x").is_err());
        assert!(parse_timer_spec("bad zone:daily:1d").is_err());
    }
}
