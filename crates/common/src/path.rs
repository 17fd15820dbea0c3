//! Canonical virtual paths.
//!
//! Every path handed across a component boundary is a [`VirtualPath`]: a
//! normalized, rooted path with a single canonical spelling (no trailing
//! slash, no empty or `.` segments, `..` stripped). Equality checks such as
//! the move-into-itself guard are robust by construction instead of relying
//! on ad hoc slash trimming at every call site.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized logical path inside one storage backend.
///
/// The root is represented by the empty string and displays as `/`. All other
/// paths are `/`-joined segments with a single leading slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// The root path.
    pub fn root() -> Self {
        VirtualPath(String::new())
    }

    /// Normalize an arbitrary path string.
    ///
    /// Empty and `.` segments collapse; `..` segments are dropped outright so
    /// a caller-supplied path can never escape its backend root.
    pub fn new(raw: &str) -> Self {
        let mut out = String::new();
        for seg in raw.split('/') {
            let seg = seg.trim();
            if seg.is_empty() || seg == "." || seg == ".." {
                continue;
            }
            out.push('/');
            out.push_str(seg);
        }
        VirtualPath(out)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The canonical string form: empty for root, otherwise `/a/b`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append one or more segments (the argument is normalized too, so
    /// `join("a/b")` nests).
    pub fn join(&self, name: &str) -> Self {
        let suffix = VirtualPath::new(name);
        VirtualPath(format!("{}{}", self.0, suffix.0))
    }

    /// The containing path; the root is its own parent.
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(idx) => VirtualPath(self.0[..idx].to_string()),
            None => VirtualPath::root(),
        }
    }

    /// The final segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[idx + 1..])
    }

    /// Split into (parent, final segment).
    pub fn split(&self) -> (Self, Option<&str>) {
        (self.parent(), self.file_name())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Whether `self` equals `prefix` or lies underneath it, on segment
    /// boundaries (`/ab` is not inside `/a`).
    pub fn is_same_or_inside(&self, prefix: &Self) -> bool {
        if prefix.is_root() {
            return true;
        }
        if self.0.len() == prefix.0.len() {
            return self.0.eq_ignore_ascii_case(&prefix.0);
        }
        self.0.len() > prefix.0.len()
            && self.0[..prefix.0.len()].eq_ignore_ascii_case(&prefix.0)
            && self.0.as_bytes()[prefix.0.len()] == b'/'
    }

    /// Location equality, tolerant of ASCII case differences. Trailing-slash
    /// differences are already gone after normalization.
    pub fn same_location(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Rewrite `old_prefix` to `new_prefix`, returning `None` when `self` is
    /// not under `old_prefix`. Used when migrating records after a subtree
    /// moved.
    pub fn rebase(&self, old_prefix: &Self, new_prefix: &Self) -> Option<Self> {
        if !self.is_same_or_inside(old_prefix) {
            return None;
        }
        let rest = &self.0[old_prefix.0.len()..];
        Some(VirtualPath(format!("{}{}", new_prefix.0, rest)))
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        VirtualPath::new(raw)
    }
}

impl From<String> for VirtualPath {
    fn from(raw: String) -> Self {
        VirtualPath::new(&raw)
    }
}

/// Split a file name into (stem, extension-with-dot), the shape the
/// non-colliding name probe works on. Dotfiles keep the dot in the stem.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_slashes() {
        assert_eq!(VirtualPath::new("a/b").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("/a/b/").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("//a///b//").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("").as_str(), "");
        assert_eq!(VirtualPath::new("/").as_str(), "");
    }

    #[test]
    fn test_strips_dot_segments() {
        assert_eq!(VirtualPath::new("/a/./b").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("/a/../b").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("../..").as_str(), "");
    }

    #[test]
    fn test_join_and_split() {
        let p = VirtualPath::new("/docs").join("a.txt");
        assert_eq!(p.as_str(), "/docs/a.txt");
        assert_eq!(p.parent().as_str(), "/docs");
        assert_eq!(p.file_name(), Some("a.txt"));

        let root = VirtualPath::root();
        assert!(root.is_root());
        assert_eq!(root.parent(), root);
        assert_eq!(root.file_name(), None);
        assert_eq!(root.join("x").as_str(), "/x");
    }

    #[test]
    fn test_join_nested() {
        let p = VirtualPath::root().join("a/b/c");
        assert_eq!(p.as_str(), "/a/b/c");
    }

    #[test]
    fn test_same_location_ignores_case_and_trailing_slash() {
        let a = VirtualPath::new("/Docs/Work/");
        let b = VirtualPath::new("/docs/work");
        assert!(a.same_location(&b));
        assert!(!a.same_location(&VirtualPath::new("/docs/work2")));
    }

    #[test]
    fn test_is_same_or_inside() {
        let base = VirtualPath::new("/a/b");
        assert!(VirtualPath::new("/a/b").is_same_or_inside(&base));
        assert!(VirtualPath::new("/a/b/c").is_same_or_inside(&base));
        assert!(VirtualPath::new("/A/B/c").is_same_or_inside(&base));
        assert!(!VirtualPath::new("/a/bc").is_same_or_inside(&base));
        assert!(!VirtualPath::new("/a").is_same_or_inside(&base));
        assert!(VirtualPath::new("/anything").is_same_or_inside(&VirtualPath::root()));
    }

    #[test]
    fn test_rebase() {
        let p = VirtualPath::new("/a/b/c.txt");
        let out = p
            .rebase(&VirtualPath::new("/a/b"), &VirtualPath::new("/x"))
            .unwrap();
        assert_eq!(out.as_str(), "/x/c.txt");
        assert!(p
            .rebase(&VirtualPath::new("/other"), &VirtualPath::new("/x"))
            .is_none());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("a.txt"), ("a", ".txt"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }
}
