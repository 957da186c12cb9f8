//! Locator parsing and output filename derivation.
//!
//! The output file of a download is `<output dir>/<last path segment>`,
//! sanitized for Linux filesystems. Locators that are not absolute URLs, or
//! whose path names no file, are rejected.

mod sanitize;

pub use sanitize::sanitize_filename_for_linux;

use url::Url;

/// Parses a locator into a URL the communication component can use.
pub fn parse_locator(locator: &str) -> Option<Url> {
    let url = Url::parse(locator.trim()).ok()?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return None;
    }
    Some(url)
}

/// Derives the local filename for `locator`, or `None` if it has no usable name.
///
/// - `derive_filename("https://example.com/a/archive.zip?x=1")` → `Some("archive.zip")`
/// - `derive_filename("https://example.com/")` → `None`
pub fn derive_filename(locator: &str) -> Option<String> {
    let url = parse_locator(locator)?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let sanitized = sanitize_filename_for_linux(segment);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        None
    } else {
        Some(sanitized)
    }
}
