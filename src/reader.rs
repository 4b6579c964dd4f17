//! Archive reader: decodes entries one block at a time and restores them
//! below an output directory.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use log::{debug, info, warn};

use crate::block::{BLOCK_SIZE, padding_for};
use crate::compression::{Source, read_full, spool};
use crate::error::{TarError, TarResult};
use crate::header::{NAME_LEN, TarHeader, TypeFlag, is_blank_name};

/// Owns an archive source and its cursor while extracting
pub struct Extractor<S: Read + Seek> {
    source: S,
    start: u64,
    pos: u64,
    out_dir: PathBuf,
    overwrite: bool,
    done: bool,
}

impl<S: Read + Seek> Extractor<S> {
    /// Prepare extraction into `out_dir`, creating it when missing.
    /// Entries are read starting at the current position of `source`.
    pub fn new(mut source: S, out_dir: &Path, overwrite: bool) -> TarResult<Self> {
        check_out_dir(out_dir)?;
        fs::create_dir_all(out_dir)?;
        let start = source.stream_position()?;
        Ok(Self {
            source,
            start,
            pos: start,
            out_dir: out_dir.to_path_buf(),
            overwrite,
            done: false,
        })
    }

    /// Current stream offset
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Process the next entry and return its header, or `None` once the
    /// end-of-archive marker or the end of the stream is reached.
    ///
    /// A checksum mismatch is returned as [`TarError::Checksum`]; the
    /// extractor should not be used after any error.
    pub fn extract_next(&mut self) -> TarResult<Option<TarHeader>> {
        if self.done {
            return Ok(None);
        }

        let mut block = [0u8; BLOCK_SIZE];
        let n = read_full(&mut self.source, &mut block[..NAME_LEN])?;
        self.pos += n as u64;
        if n != NAME_LEN || is_blank_name(&block[..NAME_LEN]) {
            self.done = true;
            return Ok(None);
        }

        let n = read_full(&mut self.source, &mut block[NAME_LEN..])?;
        self.pos += n as u64;
        if n != BLOCK_SIZE - NAME_LEN {
            self.done = true;
            return Ok(None);
        }

        let header = TarHeader::from_bytes(&block)?;
        let path = header.path();
        let target = resolve_target(&self.out_dir, &path);

        match (header.typeflag, target) {
            (TypeFlag::Regular, Some(target)) => {
                self.extract_file(&target, header.size)?;
            }
            (TypeFlag::Directory, Some(target)) => {
                debug!("creating {}", target.display());
                fs::create_dir_all(&target)?;
                self.skip(header.size)?;
            }
            (TypeFlag::Symlink, _) => {
                debug!("symlink {} is not materialized", path);
                self.skip(header.size)?;
            }
            (TypeFlag::Regular | TypeFlag::Directory, None) => {
                warn!("skipping {}: path escapes the output directory", path);
                self.skip(header.size)?;
            }
            (flag, _) => {
                debug!("skipping {} (type {:?})", path, flag);
                self.skip(header.size)?;
            }
        }

        self.align()?;
        Ok(Some(header))
    }

    /// Extract every remaining entry, returning how many were processed
    pub fn run(mut self) -> TarResult<usize> {
        let mut count = 0;
        while self.extract_next()?.is_some() {
            count += 1;
        }
        info!("extracted {} entries into {}", count, self.out_dir.display());
        Ok(count)
    }

    /// Give the source back
    pub fn into_inner(self) -> S {
        self.source
    }

    fn extract_file(&mut self, target: &Path, size: u64) -> TarResult<()> {
        if target.exists() && !self.overwrite {
            debug!("keeping existing {}", target.display());
            self.skip(size)?;
            return Ok(());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("extracting {} ({} bytes)", target.display(), size);
        let mut file = File::create(target)?;
        let copied = io::copy(&mut (&mut self.source).take(size), &mut file)?;
        self.pos += copied;
        if copied != size {
            return Err(TarError::LengthMismatch {
                path: target.to_path_buf(),
                expected: size,
                copied,
            });
        }
        Ok(())
    }

    /// Move the cursor `n` bytes forward, returning the new offset
    fn skip(&mut self, n: u64) -> TarResult<u64> {
        if n == 0 {
            return Ok(self.pos);
        }
        let offset = i64::try_from(n).map_err(|_| TarError::InvalidField {
            field: "size",
            value: n.to_string(),
        })?;
        self.pos = self.source.seek(SeekFrom::Current(offset))?;
        Ok(self.pos)
    }

    /// Move the cursor to the next block boundary, returning the new offset
    fn align(&mut self) -> TarResult<u64> {
        let padding = padding_for(self.pos - self.start);
        self.skip(padding as u64)
    }
}

fn check_out_dir(out_dir: &Path) -> TarResult<()> {
    if out_dir.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(TarError::BlankOutputDir);
    }
    Ok(())
}

/// Join an archive path onto `out_dir`, refusing anything that could land
/// outside of it
fn resolve_target(out_dir: &Path, path: &str) -> Option<PathBuf> {
    let mut target = out_dir.to_path_buf();
    let mut depth = 0;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(target)
}

/// Extract a whole archive from `source` into `out_dir`.
///
/// Gzip input is recognized by its magic bytes and decompressed through a
/// temporary spool file, which is truncated and released on every exit path.
/// Existing files are kept unless `overwrite` is set.
pub fn extract_all<R: Read + Seek>(source: R, out_dir: &Path, overwrite: bool) -> TarResult<()> {
    check_out_dir(out_dir)?;
    let source = Source::detect(source)?;
    Extractor::new(source, out_dir, overwrite)?.run()?;
    Ok(())
}

/// Extract from a stream that is already decompressing (for example a
/// `flate2::read::MultiGzDecoder` over a pipe that cannot seek). The
/// decompressed bytes are spooled to a temporary file first.
pub fn extract_all_gzip<D: Read>(
    decoder: D,
    out_dir: &Path,
    overwrite: bool,
) -> TarResult<()> {
    check_out_dir(out_dir)?;
    let source = spool(decoder)?;
    Extractor::new(source, out_dir, overwrite)?.run()?;
    Ok(())
}
