use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::debug;

/// Idempotent directory creation; a pre-existing directory is not an error.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        debug!("Using preexisting directory: {}", path.display());
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Replaces `link` with a symlink pointing at `target`, creating parent
/// directories as needed. `target` may be relative to the link's directory.
pub fn force_symlink(target: &Path, link: &Path) -> io::Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(link) {
        Ok(_) => fs::remove_file(link)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(target, link)
}

pub fn count_lines(path: &Path) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

pub fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// True for a symlink itself, whether or not its target exists.
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
