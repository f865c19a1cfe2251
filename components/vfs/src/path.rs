//! Path handling
//!
//! Paths are always interpreted from the root. Splitting on `/` ignores empty
//! segments, so `//home///u/` and `/home/u` name the same directory.

/// Split a path into its non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Split a path into its parent segments and final component
///
/// Returns `None` for the root (there is no final component).
pub fn split_parent(path: &str) -> Option<(Vec<&str>, &str)> {
    let mut parts = segments(path);
    let name = parts.pop()?;
    Some((parts, name))
}

/// Canonical absolute form (`/a/b`, root is `/`)
pub fn normalize(path: &str) -> String {
    join_segments(&segments(path))
}

/// Build an absolute path from segments
pub fn join_segments(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Resolve `path` against a working directory
///
/// Absolute paths ignore `cwd`. `.` segments are dropped and `..` pops one
/// level, never above the root.
pub fn resolve(cwd: &str, path: &str) -> String {
    let mut stack: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        segments(cwd)
    };

    for part in segments(path) {
        match part {
            "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    join_segments(&stack)
}

/// Segments of `path` relative to `prefix`, if `path` lies under it
///
/// Matching is done on whole segments: `/home/u` is under `/home` but not
/// under `/ho`.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let path_parts = segments(path);
    let prefix_parts = segments(prefix);

    if prefix_parts.len() > path_parts.len() {
        return None;
    }
    if path_parts.iter().zip(prefix_parts.iter()).any(|(a, b)| a != b) {
        return None;
    }
    Some(path_parts[prefix_parts.len()..].to_vec())
}
