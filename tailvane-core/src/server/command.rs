//! The line-based query protocol: one command per line, case-insensitive
//! verb, optional argument.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WipeTarget {
    Zone(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Zones,
    Globs(String),
    Files(String),
    Dump(String),
    Stats(String),
    Wipe(WipeTarget),
    Quit,
    Unknown,
}

pub fn parse(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Command::Unknown;
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Command::Unknown;
    }

    match (verb.to_ascii_lowercase().as_str(), arg) {
        ("zones", None) => Command::Zones,
        ("globs", Some(zone)) => Command::Globs(zone.to_string()),
        ("files", Some(zone)) => Command::Files(zone.to_string()),
        ("dump", Some(zone)) => Command::Dump(zone.to_string()),
        ("stats", Some(zone)) => Command::Stats(zone.to_string()),
        ("wipe", Some("*")) => Command::Wipe(WipeTarget::All),
        ("wipe", Some(zone)) => Command::Wipe(WipeTarget::Zone(zone.to_string())),
        ("quit", None) => Command::Quit,
        _ => Command::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(parse("ZONES"), Command::Zones);
        assert_eq!(parse("Stats web"), Command::Stats("web".to_string()));
        assert_eq!(parse("quit"), Command::Quit);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(parse("  zones  "), Command::Zones);
        assert_eq!(parse("\tfiles  mail "), Command::Files("mail".to_string()));
    }

    #[test]
    fn wipe_star_targets_all_inactive_zones() {
        assert_eq!(parse("wipe *"), Command::Wipe(WipeTarget::All));
        assert_eq!(
            parse("wipe old"),
            Command::Wipe(WipeTarget::Zone("old".to_string()))
        );
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(parse(""), Command::Unknown);
        assert_eq!(parse("zones extra"), Command::Unknown);
        assert_eq!(parse("stats"), Command::Unknown);
        assert_eq!(parse("stats a b"), Command::Unknown);
        assert_eq!(parse("shutdown"), Command::Unknown);
    }
}
