//! Node path validation and manipulation.
//!
//! Valid paths:
//! - Must start with `/`
//! - Must not end with `/` (except the root itself)
//! - Must not contain empty components (`//`)
//! - Must not contain `.` or `..` components
//! - Must not contain NUL or other control characters

use crate::error::{CoordError, Result};

fn invalid(path: &str, reason: impl Into<String>) -> CoordError {
    CoordError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Validate a node path, returning `Ok(())` if valid.
///
/// ```
/// use dlog_coord::path::validate_path;
///
/// assert!(validate_path("/").is_ok());
/// assert!(validate_path("/logs/orders/<allocation>").is_ok());
/// assert!(validate_path("logs").is_err());
/// assert!(validate_path("/logs/../etc").is_err());
/// ```
pub fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(invalid(path, "must start with '/'"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(invalid(path, "must not end with '/'"));
    }
    if let Some(ch) = path.chars().find(|c| c.is_control()) {
        return Err(invalid(path, format!("contains control character {ch:?}")));
    }
    for component in path[1..].split('/') {
        match component {
            "" => return Err(invalid(path, "empty path component")),
            "." | ".." => return Err(invalid(path, "relative path component")),
            _ => {}
        }
    }
    Ok(())
}

/// Parent of a validated path, `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last component of a validated path.
pub fn name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Join a child name onto a parent path.
pub fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Every proper ancestor of a validated path, root excluded, outermost first.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == "/" {
            break;
        }
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_paths() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/a").is_ok());
        assert!(validate_path("/a/b.c/<allocation>").is_ok());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a/b", "/a/", "/a//b", "/a/./b", "/a/..", "/a\0b"] {
            assert!(
                matches!(validate_path(bad), Err(CoordError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parent_and_name() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/a/b/c"), Some("/a/b"));
        assert_eq!(name("/a/b/c"), "c");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn ancestors_are_outermost_first() {
        assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b"]);
        assert!(ancestors("/a").is_empty());
    }
}
