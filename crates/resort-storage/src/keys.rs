//! Mapping between public delivery URLs and store paths.
//!
//! Delivery URLs have the form `{url_endpoint}[/tr:{transform}]/{folder...}/{file_name}[?query]`.
//! Transformation segments and query strings change the rendition, not the
//! stored object, so they are dropped when resolving a URL back to its path.

use percent_encoding::percent_decode_str;
use reqwest::Url;

/// Location of a stored object derived from its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePath {
    /// Folder with a leading slash and no trailing slash; `/` for the root.
    pub folder: String,
    pub file_name: String,
}

impl StorePath {
    /// Full path without a leading slash, e.g. `licenses/abc.jpg`.
    pub fn relative_path(&self) -> String {
        if self.folder == "/" {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.folder.trim_start_matches('/'), self.file_name)
        }
    }
}

/// Normalise a folder to `/a/b` form.
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Resolve a public URL to its store path relative to `url_endpoint`.
///
/// Returns `None` for URLs on another host, outside the endpoint prefix, or
/// without a file name.
pub fn parse_store_path(url: &str, url_endpoint: &str) -> Option<StorePath> {
    let url = Url::parse(url.trim()).ok()?;
    let endpoint = Url::parse(url_endpoint.trim()).ok()?;

    if url.host_str()? != endpoint.host_str()? {
        return None;
    }

    let prefix: Vec<&str> = endpoint
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|seg| !seg.is_empty())
        .collect();

    if segments.len() <= prefix.len() || segments[..prefix.len()] != prefix[..] {
        return None;
    }

    let mut parts = Vec::with_capacity(segments.len() - prefix.len());
    for seg in &segments[prefix.len()..] {
        if seg.starts_with("tr:") {
            continue;
        }
        let decoded = percent_decode_str(seg).decode_utf8().ok()?;
        if decoded == ".." || decoded == "." {
            return None;
        }
        parts.push(decoded.into_owned());
    }

    let file_name = parts.pop()?;
    Some(StorePath {
        folder: normalize_folder(&parts.join("/")),
        file_name,
    })
}

/// Canonical form used to compare a persisted URL with a listed one.
pub fn canonical_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.as_str().trim_end_matches('/').to_string())
}

/// Whether two URLs refer to the same rendition, ignoring query and fragment.
pub fn urls_match(a: &str, b: &str) -> bool {
    match (canonical_url(a), canonical_url(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
