use plansync_core::paths::{EPICS_FILE, STATUS_FILE};
use std::path::{Path, PathBuf};

/// Resolve the planning output root.
///
/// Priority:
/// 1. `--root` flag / `PLANSYNC_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `sprint-status.yaml`
/// 3. Walk upward from `cwd` looking for `epics.md`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    for marker in [STATUS_FILE, EPICS_FILE] {
        let mut dir = cwd.clone();
        loop {
            if dir.join(marker).is_file() {
                return dir;
            }
            match dir.parent() {
                Some(p) => dir = p.to_path_buf(),
                None => break,
            }
        }
    }

    cwd
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }
}
