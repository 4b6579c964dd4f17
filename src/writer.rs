//! Archive writer: one header block plus padded payload per entry, closed by
//! a single zero block.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use log::{debug, info};

use crate::block::{ZERO_BLOCK, padding_for};
use crate::error::{TarError, TarResult};
use crate::fs::{EntryKind, FsEntry, relative_name, walk};
use crate::header::{MAX_SIZE, TarHeader, TypeFlag};

/// Streams ustar entries into a byte sink, tracking the sink position itself
pub struct TarWriter<W: Write> {
    inner: W,
    pos: u64,
}

impl<W: Write> TarWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Write `header`, then exactly `header.size` bytes from `data`, then
    /// zero padding up to the next block boundary.
    ///
    /// Directory and symlink headers carry no payload and `data` is not read.
    pub fn append<R: Read>(&mut self, header: &TarHeader, data: R) -> TarResult<()> {
        self.write_bytes(&header.to_bytes())?;

        if matches!(header.typeflag, TypeFlag::Directory | TypeFlag::Symlink) {
            return Ok(());
        }

        let copied = io::copy(&mut data.take(header.size), &mut self.inner)?;
        self.pos += copied;
        if copied != header.size {
            return Err(TarError::LengthMismatch {
                path: header.path().into(),
                expected: header.size,
                copied,
            });
        }
        self.pad()
    }

    /// Append one filesystem entry found under `root`
    pub fn append_entry(&mut self, root: &Path, entry: &FsEntry) -> TarResult<()> {
        let rel = relative_name(root, &entry.path);
        match entry.kind {
            EntryKind::File => {
                let file = File::open(&entry.path)?;
                let size = file.metadata()?.len();
                if size > MAX_SIZE {
                    return Err(TarError::TooLarge {
                        path: entry.path.clone(),
                        size,
                    });
                }
                let mut header = TarHeader::new(&rel, TypeFlag::Regular, size);
                header.mtime = entry.mtime();
                debug!("adding {} ({} bytes)", rel, size);
                self.append(&header, file)
            }
            EntryKind::Directory => {
                let mut header = TarHeader::new(&format!("{}/", rel), TypeFlag::Directory, 0);
                header.mtime = entry.mtime();
                debug!("adding {}/", rel);
                self.append(&header, io::empty())
            }
            EntryKind::Symlink => {
                let mut header = TarHeader::new(&rel, TypeFlag::Symlink, 0);
                header.mtime = entry.mtime();
                debug!("adding symlink {}", rel);
                self.append(&header, io::empty())
            }
        }
    }

    /// Pad to a block boundary, append the end-of-archive block, flush and
    /// hand the sink back
    pub fn finish(mut self) -> TarResult<W> {
        self.pad()?;
        self.write_bytes(&ZERO_BLOCK)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn pad(&mut self) -> TarResult<()> {
        let padding = padding_for(self.pos);
        if padding > 0 {
            self.write_bytes(&ZERO_BLOCK[..padding])?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> TarResult<()> {
        self.inner.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

/// Archive every entry below `root` into `sink`.
///
/// The sink is flushed and dropped when the archive is complete. A failure
/// leaves whatever was already written in place.
pub fn archive<W: Write>(root: &Path, sink: W) -> TarResult<()> {
    if !root.is_dir() {
        return Err(TarError::MissingRoot(root.to_path_buf()));
    }
    let entries = walk(root)?;
    let mut writer = TarWriter::new(sink);
    for entry in &entries {
        writer.append_entry(root, entry)?;
    }
    let bytes = writer.position();
    writer.finish()?;
    info!("archived {} entries from {} ({} bytes)", entries.len(), root.display(), bytes);
    Ok(())
}
