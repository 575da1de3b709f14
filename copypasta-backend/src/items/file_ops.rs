//! File operations for item content
//!
//! Handles id generation, filename sanitizing, exclusive creation, atomic
//! replacement and directory scans of the `notes/` and `files/` directories.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of in-flight replacement files (always hidden, see `temp_path_for`)
pub const TEMP_SUFFIX: &str = ".tmp";

/// Byte budget for the sanitized name. The id prefix and the temp-file
/// wrapper (`.{id}.{uuid}.tmp`) must still fit in a 255-byte file name.
const MAX_NAME_BYTES: usize = 180;

/// MIME types treated as text in addition to `text/*`
const TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/javascript",
    "application/xml",
    "application/x-sh",
    "application/x-yaml",
    "application/toml",
];

/// Sanitize an uploaded filename so it can be embedded in an item id
/// (e.g. "../etc/My Report (1).pdf" -> "My-Report-1-.pdf")
pub fn sanitize_file_name(name: &str) -> String {
    // Keep only the final path component
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let collapsed = cleaned
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join("-");

    let trimmed = collapsed.trim_start_matches('.');
    if trimmed.is_empty() {
        return "file".to_string();
    }

    let mut end = trimmed.len().min(MAX_NAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Build an item id from the creation time. Files carry their sanitized
/// name; `attempt > 0` adds a disambiguating counter after the timestamp.
pub fn item_id(created_millis: i64, attempt: u32, file_name: Option<&str>) -> String {
    let stamp = if attempt == 0 {
        created_millis.to_string()
    } else {
        format!("{}-{}", created_millis, attempt)
    };

    match file_name {
        Some(name) => format!("{}-{}", stamp, sanitize_file_name(name)),
        None => stamp,
    }
}

/// True for MIME types whose bodies are stored and shown as text
pub fn is_text_mime(mime: &str) -> bool {
    let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    mime.starts_with("text/") || TEXT_MIME_TYPES.contains(&mime.as_str())
}

/// Create `path` exclusively and write `bytes` into it.
/// Fails with `AlreadyExists` if the path is taken; a partially written
/// file is removed before the error is returned.
pub fn create_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        fs::remove_file(path).ok();
        return Err(e);
    }
    Ok(())
}

/// Hidden sibling used while replacing `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}{}", name, uuid::Uuid::new_v4().simple(), TEMP_SUFFIX))
}

/// Replace the contents of `path` atomically (write a temp file, then rename)
pub fn replace(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(path);
    let result = fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&temp, path));

    if result.is_err() {
        fs::remove_file(&temp).ok();
    }
    result
}

/// Remove a file, treating "already gone" as success. Returns whether a file was deleted.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// List item content files in a storage directory (non-recursive, hidden files skipped)
pub fn list_item_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    list_files(dir, |name| !name.starts_with('.'))
}

/// List leftover replacement files in a storage directory
pub fn list_temp_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    list_files(dir, |name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
}

fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if !dir.exists() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if keep(&name) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Remove a directory with everything in it and recreate it empty
pub fn reset_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("My Report (1).pdf"), "My-Report-1-.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_sanitize_truncates_by_bytes() {
        let wide = format!("{}.txt", "字".repeat(130));
        let name = sanitize_file_name(&wide);
        assert!(name.len() <= MAX_NAME_BYTES);
        assert!(name.chars().all(|c| c == '字'));

        let id = item_id(1700000000000, 99, Some(&wide));
        let dir = tempdir().unwrap();
        let path = dir.path().join(&id);
        create_new(&path, b"x").unwrap();
        replace(&path, b"y").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "y");
    }

    #[test]
    fn test_item_id() {
        assert_eq!(item_id(1700000000000, 0, None), "1700000000000");
        assert_eq!(item_id(1700000000000, 2, None), "1700000000000-2");
        assert_eq!(item_id(1700000000000, 0, Some("a b.txt")), "1700000000000-a-b.txt");
        assert_eq!(item_id(1700000000000, 1, Some("a.txt")), "1700000000000-1-a.txt");
    }

    #[test]
    fn test_is_text_mime() {
        assert!(is_text_mime("text/plain"));
        assert!(is_text_mime("text/markdown; charset=utf-8"));
        assert!(is_text_mime("application/json"));
        assert!(!is_text_mime("image/png"));
        assert!(!is_text_mime("application/octet-stream"));
    }

    #[test]
    fn test_create_new_is_exclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("123");

        create_new(&path, b"first").unwrap();
        let err = create_new(&path, b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn test_replace_overwrites_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note");
        create_new(&path, b"hello world").unwrap();

        replace(&path, b"goodbye").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "goodbye");
        assert!(list_temp_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone");
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());
    }

    #[test]
    fn test_listing_separates_items_and_temp_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1700"), "a").unwrap();
        fs::write(dir.path().join("1701-b.txt"), "b").unwrap();
        fs::write(dir.path().join(".1700.abc.tmp"), "partial").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(list_item_files(dir.path()).unwrap().len(), 2);
        assert_eq!(list_temp_files(dir.path()).unwrap().len(), 1);
        assert!(list_item_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_reset_dir() {
        let dir = tempdir().unwrap();
        let files = dir.path().join("files");
        fs::create_dir(&files).unwrap();
        fs::write(files.join("x"), "x").unwrap();

        reset_dir(&files).unwrap();
        assert!(files.is_dir());
        assert!(list_item_files(&files).unwrap().is_empty());

        let fresh = dir.path().join("notes");
        reset_dir(&fresh).unwrap();
        assert!(fresh.is_dir());
    }
}
