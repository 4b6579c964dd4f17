//! Filesystem enumeration used by the archive writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry found under an archive root
#[derive(Debug, Clone)]
pub struct FsEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: DateTime<Utc>,
}

impl FsEntry {
    /// Query kind and last-write time without following symlinks.
    ///
    /// Returns `None` for sockets, FIFOs and device nodes, which have no
    /// archivable content.
    pub fn from_path(path: &Path) -> io::Result<Option<Self>> {
        let meta = fs::symlink_metadata(path)?;
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            return Ok(None);
        };
        Ok(Some(Self {
            path: path.to_path_buf(),
            kind,
            modified: DateTime::<Utc>::from(meta.modified()?),
        }))
    }

    /// Last-write time as POSIX seconds, clamped at the epoch
    pub fn mtime(&self) -> u64 {
        self.modified.timestamp().max(0) as u64
    }
}

/// Recursively list everything below `root` (the root itself excluded).
///
/// Directories come before their children and siblings are visited in name
/// order. Symlinked directories are reported but not descended into.
pub fn walk(root: &Path) -> io::Result<Vec<FsEntry>> {
    let mut entries = Vec::new();
    walk_into(root, &mut entries)?;
    Ok(entries)
}

fn walk_into(dir: &Path, out: &mut Vec<FsEntry>) -> io::Result<()> {
    let mut children = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();

    for child in children {
        let Some(entry) = FsEntry::from_path(&child)? else {
            warn!("skipping {}: not a file, directory or symlink", child.display());
            continue;
        };
        let descend = entry.kind == EntryKind::Directory;
        out.push(entry);
        if descend {
            walk_into(&child, out)?;
        }
    }
    Ok(())
}

/// Archive name of `path`: root stripped, separators normalized to `/`,
/// leading `/` trimmed
pub fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy()
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_string()
}
