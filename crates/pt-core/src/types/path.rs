//! Case-insensitive keys for output-binary paths.

use std::fmt;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

/// A normalized, case-insensitive key for an output-binary path.
///
/// Two projects writing `out/A.dll` and `OUT/a.dll` produce the same
/// output as far as reference resolution is concerned. Directory
/// separators are normalized to `/`.
///
/// # Examples
///
/// ```
/// use pt_core::OutputPathKey;
/// use camino::Utf8Path;
///
/// let a = OutputPathKey::new(Utf8Path::new("Out\\Lib.dll"));
/// let b = OutputPathKey::new(Utf8Path::new("out/lib.DLL"));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputPathKey(String);

impl OutputPathKey {
    /// Creates a key from a path.
    #[must_use]
    pub fn new(path: &Utf8Path) -> Self {
        Self(path.as_str().replace('\\', "/").to_lowercase())
    }

    /// Returns the normalized key text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `path` normalizes to this key.
    #[must_use]
    pub fn matches(&self, path: &Utf8Path) -> bool {
        *self == Self::new(path)
    }
}

impl From<&Utf8Path> for OutputPathKey {
    fn from(path: &Utf8Path) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for OutputPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_insensitive() {
        let a = OutputPathKey::new(Utf8Path::new("bin/Debug/Core.dll"));
        let b = OutputPathKey::new(Utf8Path::new("BIN/debug/core.dll"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "bin/debug/core.dll");
    }

    #[test]
    fn test_key_normalizes_separators() {
        let key = OutputPathKey::new(Utf8Path::new(r"C:\src\bin\App.exe"));
        assert_eq!(key.as_str(), "c:/src/bin/app.exe");
        assert!(key.matches(Utf8Path::new("c:/SRC/bin/app.exe")));
    }

    #[test]
    fn test_distinct_paths_differ() {
        let a = OutputPathKey::new(Utf8Path::new("out/a.dll"));
        let b = OutputPathKey::new(Utf8Path::new("out/b.dll"));
        assert_ne!(a, b);
    }
}
