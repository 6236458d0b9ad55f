// model-linker/src/inventory/path_utils.rs

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path: drops `.` segments and folds `..` into the
/// preceding component. The filesystem is never consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Makes `dir` absolute against the current working directory without
/// resolving symlinks.
pub fn absolute_path(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return normalize_path(dir);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(dir)),
        Err(_) => normalize_path(dir),
    }
}

/// `value` as a path of plain segments, or `None` when it is absolute or
/// steps upwards. Both separators count when looking for `..`.
pub fn plain_relative_path(value: &str) -> Option<PathBuf> {
    if value.split(['/', '\\']).any(|segment| segment == "..") {
        return None;
    }
    let mut clean = PathBuf::new();
    for component in Path::new(value).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

/// Last path segment of a workflow value. Workflows saved on Windows use
/// backslashes, so both separators are honoured regardless of host OS.
pub fn file_name_of(value: &str) -> &str {
    value
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(value)
}

/// Extension of `filename` including the leading dot, lower-cased.
pub fn lowercase_extension(filename: &str) -> Option<String> {
    let name = file_name_of(filename);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None; // ".hidden" has no extension
    }
    Some(name[dot..].to_lowercase())
}

/// `filename` without its final extension.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    }
}
