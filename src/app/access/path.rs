//! Local download path derivation
//!
//! Maps a remote URL onto a relative path inside the cache root. URLs under
//! the configured root keep their path relative to the root; any other URL
//! contributes its own path component. The result never contains `..`,
//! drive-letter colons or leading separators.

use std::path::PathBuf;

use url::Url;

use crate::constants::files;
use crate::errors::{AccessError, AccessResult};

/// Relative local path for `url`, given the server root
///
/// A `.gz` suffix is stripped because such resources are decompressed in
/// transit; a `.zip` suffix is kept because extraction happens afterwards.
pub fn relative_download_path(root: &Url, url: &Url) -> AccessResult<PathBuf> {
    let root_text = without_query(root);
    let url_text = without_query(url);

    let relative = if starts_with_ignore_case(&url_text, &root_text) {
        url_text[root_text.len()..].to_string()
    } else {
        url.path().to_string()
    };

    let mut segments: Vec<String> = relative
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| segment.replace(':', ""))
        .filter(|segment| !segment.is_empty())
        .collect();

    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = strip_suffix_ignore_case(last, files::GZIP_SUFFIX) {
            if !stripped.is_empty() {
                *last = stripped.to_string();
            }
        }
    }

    if segments.is_empty() {
        return Err(AccessError::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no file path".to_string(),
        });
    }

    Ok(segments.iter().collect())
}

/// Whether the URL's path names a gzip-compressed resource
pub fn is_gzip_url(url: &Url) -> bool {
    strip_suffix_ignore_case(url.path(), files::GZIP_SUFFIX).is_some()
}

/// `s` without `suffix`, compared case-insensitively
pub fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() {
        return None;
    }
    let split = s.len() - suffix.len();
    if !s.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = s.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn without_query(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn root() -> Url {
        Url::parse("https://data.example.org/mirror/").unwrap()
    }

    #[test]
    fn test_url_under_root_is_relative_to_root() {
        let url = Url::parse("https://data.example.org/mirror/models/ship.obj").unwrap();
        let path = relative_download_path(&root(), &url).unwrap();
        assert_eq!(path, Path::new("models").join("ship.obj"));
    }

    #[test]
    fn test_root_prefix_match_ignores_case() {
        let url = Url::parse("https://data.example.org/MIRROR/models/ship.obj").unwrap();
        let path = relative_download_path(&root(), &url).unwrap();
        assert_eq!(path, Path::new("models").join("ship.obj"));
    }

    #[test]
    fn test_foreign_url_uses_its_own_path() {
        let url = Url::parse("http://other.example.com/a/b/c.txt?x=1").unwrap();
        let path = relative_download_path(&root(), &url).unwrap();
        assert_eq!(path, Path::new("a").join("b").join("c.txt"));
    }

    #[test]
    fn test_gz_suffix_is_stripped_zip_is_kept() {
        let gz = Url::parse("https://data.example.org/mirror/shape.vtk.gz").unwrap();
        assert_eq!(
            relative_download_path(&root(), &gz).unwrap(),
            Path::new("shape.vtk")
        );

        let zip = Url::parse("https://data.example.org/mirror/bundle.zip").unwrap();
        assert_eq!(
            relative_download_path(&root(), &zip).unwrap(),
            Path::new("bundle.zip")
        );
    }

    #[test]
    fn test_drive_letters_and_dot_segments_are_dropped() {
        let url = Url::parse("file:///C:/data/../files/./a.txt").unwrap();
        let path = relative_download_path(&root(), &url).unwrap();
        assert!(!path.to_string_lossy().contains(':'));
        assert!(path.is_relative());
        assert!(path.ends_with("a.txt"));
        assert!(path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_))));
    }

    #[test]
    fn test_root_itself_has_no_path() {
        assert!(relative_download_path(&root(), &root()).is_err());
    }

    #[test]
    fn test_is_gzip_url() {
        assert!(is_gzip_url(&Url::parse("http://h/a.GZ").unwrap()));
        assert!(!is_gzip_url(&Url::parse("http://h/a.zip").unwrap()));
    }
}
