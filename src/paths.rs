//! Normalization of paths arriving from outside the crate.
//!
//! Callers hand us either `file://` URIs (possibly percent-encoded) or
//! bare filesystem paths. Everything crossing the external boundary goes
//! through [`normalize_external_path`] so the rest of the crate only ever
//! sees plain `PathBuf`s.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use url::Url;

const FILE_SCHEME: &str = "file://";

/// Turn an external path string into a filesystem path.
///
/// - `file:///a/b%20c` -> `/a/b c`
/// - `/a/b%20c` -> `/a/b c`
/// - `/a/scan #1.obj` -> `/a/scan #1.obj` (bare paths have no fragment or query)
/// - relative paths are resolved against `base`
pub fn normalize_external_path(input: &str, base: &Path) -> PathBuf {
    let trimmed = input.trim();

    match trimmed.strip_prefix(FILE_SCHEME) {
        Some(rest) => file_uri_to_path(trimmed).unwrap_or_else(|| resolve_bare(rest, base)),
        None => resolve_bare(trimmed, base),
    }
}

/// Parse a well-formed `file://` URI. A URI whose text carries a fragment
/// or query was written with a literal `#`/`?` in the name, so it is left
/// to the bare-path handling instead.
fn file_uri_to_path(input: &str) -> Option<PathBuf> {
    let url = Url::parse(input).ok()?;
    if url.scheme() != "file" || url.fragment().is_some() || url.query().is_some() {
        return None;
    }
    url.to_file_path().ok()
}

fn resolve_bare(input: &str, base: &Path) -> PathBuf {
    let path = PathBuf::from(percent_decode(input).as_ref());
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn percent_decode(input: &str) -> Cow<'_, str> {
    urlencoding::decode(input).unwrap_or(Cow::Borrowed(input))
}

/// Render a path as a `file://` URI for callers that expect one.
pub fn to_file_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|u| u.to_string())
}
