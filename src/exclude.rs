use crate::path::AbsolutePath;

/// Directory names that dominate churn in the target workloads
/// (source-control metadata, dependency trees) and would dwarf meaningful
/// signal if watched.
const EXCLUDED_NAMES: &[&str] = &[".git", "node_modules"];

/// Decides whether `candidate` is watchable, given `root`.
///
/// Rules, evaluated in order, first match wins:
/// 1. `candidate == root` → watchable.
/// 2. Any path segment of `candidate` relative to `root` is exactly one of
///    [`EXCLUDED_NAMES`] → not watchable.
/// 3. Otherwise → watchable.
///
/// A path outside `root` entirely (divergent) is treated as watchable; the
/// recursive watcher never calls this filter with such paths in practice,
/// since every path it considers is discovered underneath `root`.
pub fn is_watchable(root: &AbsolutePath, candidate: &AbsolutePath) -> bool {
    if candidate == root {
        return true;
    }

    match candidate.segments_relative_to(root) {
        Some(segments) => !segments
            .map(|c| c.as_os_str())
            .any(|segment| EXCLUDED_NAMES.iter().any(|excluded| segment == *excluded)),
        None => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn path(s: &str) -> AbsolutePath {
        AbsolutePath::new_unchecked(s)
    }

    #[test]
    fn root_is_always_watchable() {
        let root = path("/repo");
        assert!(is_watchable(&root, &root));
    }

    #[test]
    fn excludes_dot_git() {
        let root = path("/repo");
        assert!(!is_watchable(&root, &path("/repo/.git")));
        assert!(!is_watchable(&root, &path("/repo/.git/objects/pack")));
    }

    #[test]
    fn excludes_node_modules() {
        let root = path("/repo");
        assert!(!is_watchable(&root, &path("/repo/node_modules")));
        assert!(!is_watchable(
            &root,
            &path("/repo/packages/app/node_modules/some-dep")
        ));
    }

    #[test]
    fn allows_ordinary_subdirectories() {
        let root = path("/repo");
        assert!(is_watchable(&root, &path("/repo/parent/child")));
    }

    #[test]
    fn a_directory_named_like_excluded_but_outside_root_is_unaffected() {
        let root = path("/repo");
        // `.git` only matters as a path segment under root, not as a
        // substring match.
        assert!(is_watchable(&root, &path("/repo/gitignored")));
    }
}
