//! String helpers for sizes, remote keys and progress labels.

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Maximum label width used by the progress bar.
pub const MAX_LABEL_LEN: usize = 40;

/// Format a byte count with a binary unit, rounded to two decimals.
///
/// `0` → `"0 Bytes"`, `1024` → `"1 KB"`, `1536` → `"1.5 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scale: u64 = 1;
    while unit < UNITS.len() - 1 && bytes / scale >= 1024 {
        scale *= 1024;
        unit += 1;
    }

    let value = ((bytes as f64 / scale as f64) * 100.0).round() / 100.0;
    format!("{} {}", value, UNITS[unit])
}

/// Convert host path separators to forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join a remote prefix and a relative path into an object key.
///
/// Both parts accept either separator. Empty and `.` segments are dropped,
/// `..` pops the previous segment, and the result never starts with `/`.
pub fn join_remote(prefix: &str, relative: &str) -> String {
    let prefix = normalize_path(prefix);
    let relative = normalize_path(relative);

    let mut segments: Vec<&str> = Vec::new();
    for segment in prefix.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Shorten a file name for display, keeping its tail.
pub fn truncate_filename(name: &str) -> String {
    let len = name.chars().count();
    if len <= MAX_LABEL_LEN {
        return name.to_string();
    }
    let keep = MAX_LABEL_LEN - 3;
    let tail: String = name.chars().skip(len - keep).collect();
    format!("...{tail}")
}
