//! Path utility functions for normalization and display.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep the `..` when there is nothing left to pop (e.g. at root)
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Render a path with forward slashes regardless of the host separator.
///
/// Entry paths are handed to interpreters and serialized into the invocation
/// context, so they use one spelling on every platform.
pub fn format_path(path: &Path) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        return path.to_path_buf();
    }
    PathBuf::from(path.to_string_lossy().replace('\\', "/"))
}

/// Join `relative` onto `base` unless it is already absolute, then normalize.
pub fn resolve_relative_path(base_dir: &Path, relative_path: &Path) -> PathBuf {
    if relative_path.is_absolute() {
        normalize_path(relative_path)
    } else {
        normalize_path(&base_dir.join(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_simple() {
        assert_eq!(
            normalize_path(Path::new("/usr/local/bin")),
            PathBuf::from("/usr/local/bin")
        );
    }

    #[test]
    fn test_normalize_path_with_dot() {
        assert_eq!(
            normalize_path(Path::new("/pkg/./lib/./index.js")),
            PathBuf::from("/pkg/lib/index.js")
        );
    }

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/pkg/lib/../index.js")),
            PathBuf::from("/pkg/index.js")
        );
    }

    #[test]
    fn test_normalize_path_relative_leading_parent_kept() {
        assert_eq!(
            normalize_path(Path::new("../lib/index.js")),
            PathBuf::from("../lib/index.js")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_format_path_is_identity_on_unix() {
        let path = Path::new("/home/user/.pluck/dependencies/store/index.js");
        assert_eq!(format_path(path), path.to_path_buf());
    }

    #[cfg(windows)]
    #[test]
    fn test_format_path_replaces_backslashes() {
        let path = Path::new(r"C:\Users\user\.pluck\index.js");
        assert_eq!(
            format_path(path),
            PathBuf::from("C:/Users/user/.pluck/index.js")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve_relative_path(Path::new("/cache/pkg"), Path::new("./lib/index.js")),
            PathBuf::from("/cache/pkg/lib/index.js")
        );
        assert_eq!(
            resolve_relative_path(Path::new("/cache/pkg"), Path::new("/abs/main.js")),
            PathBuf::from("/abs/main.js")
        );
    }
}
