//! Ancestor-fallback path canonicalization (spec §9 "Path canonicalization"),
//! shared by `fs_guard`, `tripwire_guard`, and `self_defense`. Resolving
//! symlinks must work even for paths that don't exist yet, so writes to new
//! files are still checked against blocked/allowed prefixes.

use std::path::{Path, PathBuf};

/// Expand a leading `~` to `home`, then resolve to an absolute path against
/// `cwd`, then realpath-resolve by walking up to the deepest existing
/// ancestor and reattaching whatever suffix doesn't exist yet.
pub fn canonicalize(input: &str, home: &Path, cwd: &Path) -> PathBuf {
    let expanded = expand_tilde(input, home);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    ancestor_fallback_realpath(&absolute)
}

fn expand_tilde(input: &str, home: &Path) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        home.join(rest)
    } else if input == "~" {
        home.to_path_buf()
    } else {
        PathBuf::from(input)
    }
}

fn ancestor_fallback_realpath(absolute: &Path) -> PathBuf {
    let components: Vec<_> = absolute.components().collect();
    for split in (0..=components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        if prefix.as_os_str().is_empty() {
            continue;
        }
        if let Ok(real) = std::fs::canonicalize(&prefix) {
            let suffix: PathBuf = components[split..].iter().collect();
            return if suffix.as_os_str().is_empty() {
                real
            } else {
                real.join(suffix)
            };
        }
    }
    absolute.to_path_buf()
}

/// Whether `target` lies within `base`: the relative path from `base` to
/// `target` is empty or doesn't start with `..` and isn't itself absolute.
/// Rejects lookalike siblings (`/workspace-evil` against `/workspace`).
pub fn is_within(base: &Path, target: &Path) -> bool {
    match target.strip_prefix(base) {
        Ok(rel) => !rel.as_os_str().to_string_lossy().starts_with(".."),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let home = Path::new("/home/agent");
        let cwd = Path::new("/tmp");
        let resolved = canonicalize("~/notes.txt", home, cwd);
        assert!(resolved.starts_with("/home/agent") || resolved.ends_with("notes.txt"));
    }

    #[test]
    fn lookalike_prefix_is_rejected() {
        assert!(!is_within(Path::new("/workspace"), Path::new("/workspace-evil/x")));
        assert!(is_within(Path::new("/workspace"), Path::new("/workspace/x")));
        assert!(is_within(Path::new("/workspace"), Path::new("/workspace")));
    }

    #[test]
    fn nonexistent_suffix_still_canonicalizes() {
        let dir = tempfile::tempdir().unwrap();
        let target = format!("{}/does/not/exist.txt", dir.path().display());
        let resolved = canonicalize(&target, Path::new("/home/agent"), Path::new("/tmp"));
        assert!(resolved.ends_with("does/not/exist.txt") || resolved.ends_with("exist.txt"));
    }
}
