//! Extension helpers for video and subtitle discovery

use std::path::{Path, PathBuf};

/// Convert extensions to glob patterns
pub fn extensions_to_patterns(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim_start_matches("*.").trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .flat_map(|ext| [format!("*.{ext}"), format!("*.{}", ext.to_uppercase())])
        .collect()
}

/// `sample.<ext>` files shipped with releases are never synced
pub fn is_sample(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.eq_ignore_ascii_case("sample"))
}

/// First `<video stem>.<ext>` subtitle found next to `video`
pub fn subtitle_beside(video: &Path, subtitle_extensions: &[String]) -> Option<PathBuf> {
    let stem = video.file_stem()?.to_str()?;
    let dir = video.parent()?;

    subtitle_extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|candidate| candidate.is_file())
}
