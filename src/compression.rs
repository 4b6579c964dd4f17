//! Transparent gzip input.
//!
//! A gzip decoder cannot seek, and extraction skips payloads by seeking. A
//! gzip source is therefore decompressed in full into an anonymous temporary
//! file first, and extraction reads from that file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use flate2::read::MultiGzDecoder;
use log::debug;

/// First two bytes of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Peek at the next two bytes of `source` and report whether they are the
/// gzip magic. The stream position is restored before returning.
pub fn is_gzip<R: Read + Seek>(source: &mut R) -> io::Result<bool> {
    let start = source.stream_position()?;
    let mut magic = [0u8; 2];
    let n = read_full(source, &mut magic)?;
    source.seek(SeekFrom::Start(start))?;
    Ok(n == magic.len() && magic == GZIP_MAGIC)
}

/// Read until `buf` is full or the stream ends, returning the byte count
pub(crate) fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Scratch file holding decompressed archive bytes.
///
/// The file is anonymous (removed from the directory as soon as it is
/// created) and is truncated to zero length when dropped.
#[derive(Debug)]
pub struct SpoolFile {
    file: File,
}

impl Read for SpoolFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for SpoolFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
    }
}

/// Drain a decompressing reader into a fresh [`SpoolFile`], rewound to the
/// start
pub fn spool<R: Read>(mut decoder: R) -> io::Result<SpoolFile> {
    let file = tempfile::tempfile()?;
    let mut spool = SpoolFile { file };
    let n = io::copy(&mut decoder, &mut spool.file)?;
    spool.file.seek(SeekFrom::Start(0))?;
    debug!("spooled {} decompressed bytes", n);
    Ok(spool)
}

/// An archive byte source: either the caller's stream as-is or the spooled
/// contents of a gzip stream
#[derive(Debug)]
pub enum Source<R> {
    Raw(R),
    Spooled(SpoolFile),
}

impl<R: Read + Seek> Source<R> {
    /// Wrap `source`, decompressing it through a spool file when it starts
    /// with the gzip magic. Concatenated gzip members are decoded in turn.
    pub fn detect(mut source: R) -> io::Result<Self> {
        if is_gzip(&mut source)? {
            debug!("gzip input detected");
            Ok(Source::Spooled(spool(MultiGzDecoder::new(source))?))
        } else {
            Ok(Source::Raw(source))
        }
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Raw(r) => r.read(buf),
            Source::Spooled(s) => s.read(buf),
        }
    }
}

impl<R: Seek> Seek for Source<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Source::Raw(r) => r.seek(pos),
            Source::Spooled(s) => s.seek(pos),
        }
    }
}
