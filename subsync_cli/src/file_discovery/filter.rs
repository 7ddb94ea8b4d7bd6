//! File filtering module using glob patterns
//!
//! Video extensions become include patterns; `--exclude` values and lines of
//! the library's ignore file become exclude patterns.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;

use super::{DiscoveryError, Result};

/// Pattern matcher using GlobSet for efficient matching
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    globset: GlobSet,
}

impl PatternMatcher {
    /// Create a new pattern matcher from glob patterns
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| DiscoveryError::InvalidPattern(format!("{pattern}: {e}")))?;
            builder.add(glob);
        }

        let globset = builder
            .build()
            .map_err(|e| DiscoveryError::InvalidPattern(e.to_string()))?;

        Ok(Self { globset })
    }

    /// Check if a path matches any of the patterns
    pub fn matches(&self, path: &Path) -> bool {
        self.globset.is_match(path)
    }
}

/// File filter managing include and exclude patterns
#[derive(Debug)]
pub struct FileFilter {
    include_matcher: Option<PatternMatcher>,
    /// Overrides includes
    exclude_matcher: Option<PatternMatcher>,
}

impl FileFilter {
    /// Create a new file filter
    pub fn new(include_patterns: Vec<String>, exclude_patterns: Vec<String>) -> Result<Self> {
        let include_matcher = if !include_patterns.is_empty() {
            Some(PatternMatcher::new(&include_patterns)?)
        } else {
            None
        };

        let exclude_patterns: Vec<String> = exclude_patterns
            .iter()
            .flat_map(|p| expand_ignore_pattern(p))
            .collect();
        let exclude_matcher = if !exclude_patterns.is_empty() {
            Some(PatternMatcher::new(&exclude_patterns)?)
        } else {
            None
        };

        Ok(Self {
            include_matcher,
            exclude_matcher,
        })
    }

    /// Check if a file should be included based on patterns
    ///
    /// Rules:
    /// 1. If path matches exclude patterns -> false (exclude overrides)
    /// 2. If no include patterns -> true (include all by default)
    /// 3. If path matches include patterns -> true
    /// 4. Otherwise -> false
    pub fn should_include(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }

        if let Some(ref include) = self.include_matcher {
            include.matches(path)
        } else {
            true
        }
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_matcher
            .as_ref()
            .is_some_and(|exclude| exclude.matches(path))
    }
}

/// Expand one ignore entry so it matches at any depth
///
/// `Extras` excludes a file or directory named `Extras` anywhere below the
/// root; `*.part` keeps its usual meaning.
fn expand_ignore_pattern(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim().replace('\\', "/");
    let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
    if pattern.is_empty() {
        return Vec::new();
    }

    if pattern.starts_with("**/") || pattern.starts_with('/') {
        let rooted = pattern.trim_start_matches('/');
        return vec![rooted.to_string(), format!("{rooted}/**")];
    }

    vec![
        pattern.to_string(),
        format!("{pattern}/**"),
        format!("**/{pattern}"),
        format!("**/{pattern}/**"),
    ]
}

/// Read ignore patterns from a file, skipping blank lines and `#` comments
///
/// A missing file yields no patterns.
pub fn read_ignore_file(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pattern_matcher_basic() {
        let patterns = vec!["*.mkv".to_string(), "*.mp4".to_string()];
        let matcher = PatternMatcher::new(&patterns).unwrap();

        assert!(matcher.matches(Path::new("test.mkv")));
        assert!(matcher.matches(Path::new("test.mp4")));
        assert!(!matcher.matches(Path::new("test.avi")));
        assert!(matcher.matches(Path::new("/path/to/file.mkv")));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = PatternMatcher::new(&["[unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidPattern(_)));
    }

    #[test]
    fn test_file_filter_exclude_overrides() {
        let filter =
            FileFilter::new(vec!["*.mkv".to_string()], vec!["backup/*.mkv".to_string()]).unwrap();

        assert!(filter.should_include(Path::new("test.mkv")));
        assert!(filter.should_include(Path::new("videos/test.mkv")));
        assert!(!filter.should_include(Path::new("backup/test.mkv")));
    }

    #[test]
    fn test_bare_name_excludes_directory_at_any_depth() {
        let filter =
            FileFilter::new(vec!["*.mkv".to_string()], vec!["Extras".to_string()]).unwrap();

        assert!(!filter.should_include(Path::new("Extras/making-of.mkv")));
        assert!(!filter.should_include(Path::new("Show/Season 1/Extras/clip.mkv")));
        assert!(filter.should_include(Path::new("Show/Season 1/Show.S01E01.mkv")));
    }

    #[test]
    fn test_rooted_pattern_only_matches_from_root() {
        let filter = FileFilter::new(vec![], vec!["/Trailers".to_string()]).unwrap();

        assert!(!filter.should_include(Path::new("Trailers/a.mkv")));
        assert!(filter.should_include(Path::new("Show/Trailers/a.mkv")));
    }

    #[test]
    fn test_file_filter_no_patterns() {
        let filter = FileFilter::new(vec![], vec![]).unwrap();

        assert!(filter.should_include(Path::new("test.mkv")));
        assert!(filter.should_include(Path::new("any/path/file.xyz")));
    }

    #[test]
    fn test_read_ignore_file_skips_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".subsyncignore");
        fs::write(&path, "# trailers\nTrailers\n\n  *.part  \n").unwrap();

        assert_eq!(read_ignore_file(&path).unwrap(), vec!["Trailers", "*.part"]);
        assert!(read_ignore_file(&dir.path().join("missing")).unwrap().is_empty());
    }
}
