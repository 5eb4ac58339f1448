use std::{
    fmt,
    path::{Path, PathBuf},
};

/// A canonical, absolute filesystem path.
///
/// This is intentionally minimal: the watcher only ever needs to join,
/// display, and walk up ancestors of paths it already knows are absolute.
/// A richer path-typing library is treated as an external collaborator and
/// is out of scope for this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    /// Wraps `path`, requiring it to already be absolute.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        path.is_absolute().then_some(Self(path))
    }

    /// Wraps `path` without checking. Callers must uphold the absoluteness
    /// invariant themselves (e.g. paths reported by a notification backend,
    /// which are always absolute).
    pub fn new_unchecked(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    pub fn join(&self, name: impl AsRef<Path>) -> Self {
        Self(self.0.join(name))
    }

    pub fn starts_with(&self, base: &Self) -> bool {
        self.0.starts_with(&base.0)
    }

    /// The path segments of `self`, relative to `root`, or `None` if
    /// `self` is not `root` or a descendant of it.
    pub fn segments_relative_to<'a>(&'a self, root: &Self) -> Option<std::path::Components<'a>> {
        self.0.strip_prefix(&root.0).ok().map(|p| p.components())
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<AbsolutePath> for PathBuf {
    fn from(value: AbsolutePath) -> Self {
        value.0
    }
}

impl TryFrom<PathBuf> for AbsolutePath {
    type Error = PathBuf;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value.clone()).ok_or(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(AbsolutePath::new("relative/path").is_none());
    }

    #[test]
    fn segments_relative_to_root() {
        let root = AbsolutePath::new_unchecked("/a/b");
        let child = AbsolutePath::new_unchecked("/a/b/c/d");
        let segments: Vec<_> = child
            .segments_relative_to(&root)
            .unwrap()
            .map(|c| c.as_os_str().to_owned())
            .collect();
        assert_eq!(segments, vec!["c", "d"]);
    }

    #[test]
    fn segments_relative_to_root_is_none_for_divergent_path() {
        let root = AbsolutePath::new_unchecked("/a/b");
        let other = AbsolutePath::new_unchecked("/x/y");
        assert!(other.segments_relative_to(&root).is_none());
    }
}
