use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replaces `path` with `data` without ever exposing a partial file.
///
/// The bytes go to a fresh temporary file in the target's directory, are
/// fsynced, and the temporary file is then renamed over the target. If any
/// step fails the temporary file is removed and the target is untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)?;

    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
