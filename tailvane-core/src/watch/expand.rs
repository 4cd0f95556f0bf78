//! Wildcard expansion: resolve each zone's glob patterns to canonical paths
//! of existing regular files, in configuration order.

use crate::settings::ZoneSpec;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Expand every zone's wildcards. Relative patterns resolve against
/// `change_dir` when one is configured; matches are canonicalized so the
/// same file reached through different paths maps to one watcher.
pub fn resolve_zone_paths(
    zones: &[ZoneSpec],
    change_dir: Option<&Path>,
) -> Vec<(String, Vec<PathBuf>)> {
    zones
        .iter()
        .map(|zone| {
            let mut paths = Vec::new();
            for wildcard in &zone.wildcards {
                paths.extend(expand_one(wildcard, change_dir));
            }
            (zone.name.clone(), paths)
        })
        .collect()
}

fn expand_one(wildcard: &str, change_dir: Option<&Path>) -> Vec<PathBuf> {
    let pattern = match change_dir {
        Some(dir) if !Path::new(wildcard).is_absolute() => {
            dir.join(wildcard).to_string_lossy().into_owned()
        }
        _ => wildcard.to_string(),
    };

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(err) => {
            // Patterns are validated at startup; this only fires for
            // patterns that became invalid through change-dir joining.
            warn!(pattern, error = %err, "skipping bad wildcard");
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .filter_map(|path| match path.canonicalize() {
            Ok(canonical) => Some(canonical),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot canonicalize match");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn zone(name: &str, wildcards: &[&str]) -> ZoneSpec {
        ZoneSpec {
            name: name.to_string(),
            wildcards: wildcards.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn globs_match_only_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "").unwrap();
        std::fs::write(dir.path().join("b.log"), "").unwrap();
        std::fs::create_dir(dir.path().join("c.log")).unwrap();

        let pattern = dir.path().join("*.log").to_string_lossy().into_owned();
        let resolved = resolve_zone_paths(&[zone("a", &[pattern.as_str()])], None);

        assert_eq!(resolved.len(), 1);
        let (name, mut paths) = resolved.into_iter().next().unwrap();
        paths.sort();
        assert_eq!(name, "a");
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.log"));
        assert!(paths[1].ends_with("b.log"));
    }

    #[test]
    fn relative_patterns_resolve_against_change_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mail.log"), "").unwrap();

        let resolved = resolve_zone_paths(&[zone("mail", &["mail.log"])], Some(dir.path()));
        assert_eq!(resolved[0].1.len(), 1);
        assert!(resolved[0].1[0].ends_with("mail.log"));
    }

    #[test]
    fn missing_matches_resolve_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.nothing").to_string_lossy().into_owned();
        let resolved = resolve_zone_paths(&[zone("a", &[pattern.as_str()])], None);
        assert!(resolved[0].1.is_empty());
    }

    #[test]
    fn aliased_paths_canonicalize_to_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.log"), "").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.log"), dir.path().join("alias.log"))
            .unwrap();

        let real = dir.path().join("real.log").to_string_lossy().into_owned();
        let alias = dir.path().join("alias.log").to_string_lossy().into_owned();
        let resolved =
            resolve_zone_paths(&[zone("a", &[real.as_str(), alias.as_str()])], None);

        assert_eq!(resolved[0].1.len(), 2);
        assert_eq!(resolved[0].1[0], resolved[0].1[1]);
    }
}
