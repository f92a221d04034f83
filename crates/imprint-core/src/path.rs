//! Logical path helpers.
//!
//! Catalog paths are absolute, `/`-separated and never carry a trailing
//! separator except for the root itself.

/// The catalog root.
pub const ROOT: &str = "/";

/// Strips a trailing `/` unless the path is the root.
#[must_use]
pub fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Returns the parent collection of `path`, or `None` for the root.
///
/// ```rust
/// use imprint_core::path::parent;
///
/// assert_eq!(parent("/tempZone/home/alice"), Some("/tempZone/home"));
/// assert_eq!(parent("/tempZone"), Some("/"));
/// assert_eq!(parent("/"), None);
/// ```
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    let path = normalize(path);
    if path == ROOT || path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the last path component.
#[must_use]
pub fn object_name(path: &str) -> &str {
    let path = normalize(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// Splits a data object path into `(collection, name)`.
#[must_use]
pub fn split(path: &str) -> (&str, &str) {
    (parent(path).unwrap_or(ROOT), object_name(path))
}

/// Iterates the ancestor collections of `path`, nearest first, ending at `/`.
///
/// The path itself is not yielded.
#[must_use]
pub fn ancestors(path: &str) -> Ancestors<'_> {
    Ancestors {
        next: parent(path),
    }
}

/// Iterator returned by [`ancestors`].
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = parent(current);
        Some(current)
    }
}

/// Returns true if `path` equals `collection` or lies beneath it.
#[must_use]
pub fn is_within(path: &str, collection: &str) -> bool {
    let path = normalize(path);
    let collection = normalize(collection);
    if collection == ROOT {
        return path.starts_with('/');
    }
    path == collection
        || path
            .strip_prefix(collection)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Returns `path` relative to `collection`, or `None` if it does not lie
/// strictly beneath it.
///
/// ```rust
/// use imprint_core::path::relative;
///
/// assert_eq!(relative("/z/home/ds/raw/a.txt", "/z/home/ds"), Some("raw/a.txt"));
/// assert_eq!(relative("/z/home/ds", "/z/home/ds"), None);
/// ```
#[must_use]
pub fn relative<'a>(path: &'a str, collection: &str) -> Option<&'a str> {
    let path = normalize(path);
    let collection = normalize(collection);
    let rest = if collection == ROOT {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(collection)?.strip_prefix('/')?
    };
    (!rest.is_empty()).then_some(rest)
}
