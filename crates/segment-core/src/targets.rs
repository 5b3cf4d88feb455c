//! No-overwrite file targets
//!
//! Existing files are never replaced. New files are created with
//! `create_new`, which fails atomically when the path exists, and renames
//! claim their destination in a shared registry first so two workers cannot
//! both move a file onto the same name.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Destinations claimed during one invocation
#[derive(Debug, Default)]
pub struct TargetClaims {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl TargetClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`. Returns false when it was already claimed.
    pub fn claim(&self, path: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }
}

/// Outcome of writing a new file
#[derive(Debug)]
pub enum WriteOutcome {
    Written(u64),
    /// The path already existed and was left untouched
    Exists,
}

/// Write `bytes` to a file that must not exist yet.
///
/// A write that fails after the file was created removes the partial file.
pub fn write_new(path: &Path, bytes: &[u8]) -> io::Result<WriteOutcome> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(WriteOutcome::Exists),
        Err(e) => return Err(e),
    };

    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }

    Ok(WriteOutcome::Written(bytes.len() as u64))
}

/// Create `<dir>/<stem>.<ext>` exclusively, adding `-1`, `-2` ... to the stem on a clash
pub fn create_unique(dir: &Path, stem: &str, ext: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{attempt}.{ext}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < 1000 => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Write `bytes` to a fresh `<dir>/<stem>.<ext>`, suffixing the stem on a clash
pub fn write_unique(dir: &Path, stem: &str, ext: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let (path, mut file) = create_unique(dir, stem, ext)?;
    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    Ok(path)
}
