//! Streaming ustar archive writer and extractor
//!
//! # Usage
//!
//! ## Packing a directory tree
//!
//! ```no_run
//! use ustar_stream::pack;
//!
//! pack("archive.tar", "project").unwrap();
//! // Writes every file, directory and symlink below project/
//! pack("archive.tar.gz", "project").unwrap();
//! // Same, gzip-compressed
//! ```
//!
//! ## Unpacking an archive
//!
//! ```no_run
//! use ustar_stream::unpack;
//!
//! unpack("archive.tar.gz", "output_directory", false).unwrap();
//! // gzip input is detected from its magic bytes; existing files are kept
//! ```
//!
//! ## Streams
//!
//! ```no_run
//! use std::fs::File;
//! use std::path::Path;
//! use ustar_stream::{archive, extract_all};
//!
//! let sink = File::create("archive.tar").unwrap();
//! archive(Path::new("project"), sink).unwrap();
//!
//! let source = File::open("archive.tar").unwrap();
//! extract_all(source, Path::new("restored"), true).unwrap();
//! ```
//!
//! ## Headers
//!
//! ```
//! use ustar_stream::{TarHeader, TypeFlag};
//!
//! let header = TarHeader::new("docs/readme.txt", TypeFlag::Regular, 1024);
//! let bytes = header.to_bytes();
//! let decoded = TarHeader::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded.path(), "docs/readme.txt");
//! assert_eq!(decoded.size, 1024);
//! ```

pub mod block;
pub mod compression;
pub mod error;
pub mod fs;
pub mod header;
pub mod reader;
pub mod writer;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

pub use error::{TarError, TarResult};
pub use header::{TarHeader, TypeFlag};
pub use reader::{Extractor, extract_all, extract_all_gzip};
pub use writer::{TarWriter, archive};

fn is_gzip_name(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Archive the tree below `root` into `tarfile` (gzip-compressed when the
/// name ends in `.tar.gz` or `.tgz`)
pub fn pack<P: AsRef<Path>, Q: AsRef<Path>>(tarfile: P, root: Q) -> TarResult<()> {
    let (tarfile, root) = (tarfile.as_ref(), root.as_ref());
    if !root.is_dir() {
        return Err(TarError::MissingRoot(root.to_path_buf()));
    }

    let out = BufWriter::new(File::create(tarfile)?);
    if is_gzip_name(tarfile) {
        let mut encoder = GzEncoder::new(out, Compression::default());
        archive(root, &mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        archive(root, out)?;
    }
    Ok(())
}

/// Extract `tarfile` (plain or gzip) into `output_dir`
pub fn unpack<P: AsRef<Path>, Q: AsRef<Path>>(
    tarfile: P,
    output_dir: Q,
    overwrite: bool,
) -> TarResult<()> {
    let source = BufReader::new(File::open(tarfile.as_ref())?);
    extract_all(source, output_dir.as_ref(), overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/nested/data.bin"), vec![7u8; 1500]).unwrap();
        fs::write(root.join("Cargo.toml"), "[package]\n").unwrap();
    }

    fn assert_sample_tree(root: &Path) {
        assert!(root.join("src/nested").is_dir());
        assert_eq!(fs::read_to_string(root.join("src/main.rs")).unwrap(), "fn main() {}\n");
        assert_eq!(fs::read(root.join("src/nested/data.bin")).unwrap(), vec![7u8; 1500]);
        assert_eq!(fs::read_to_string(root.join("Cargo.toml")).unwrap(), "[package]\n");
    }

    #[test]
    fn test_pack_unpack() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("tree");
        sample_tree(&root);

        let tarfile = work.path().join("tree.tar");
        pack(&tarfile, &root).unwrap();
        let len = fs::metadata(&tarfile).unwrap().len();
        assert_eq!(len % 512, 0);

        let out = work.path().join("out");
        unpack(&tarfile, &out, false).unwrap();
        assert_sample_tree(&out);
    }

    #[test]
    fn test_tar_gz() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("tree");
        sample_tree(&root);

        for name in ["tree.tar.gz", "tree.tgz"] {
            let tarfile = work.path().join(name);
            pack(&tarfile, &root).unwrap();
            let head = fs::read(&tarfile).unwrap();
            assert_eq!(&head[..2], &[0x1f, 0x8b]);

            let out = work.path().join(format!("out-{}", name));
            unpack(&tarfile, &out, false).unwrap();
            assert_sample_tree(&out);
        }
    }

    #[test]
    fn test_gzip_detected_by_magic() {
        let work = tempfile::tempdir().unwrap();
        let root = work.path().join("tree");
        sample_tree(&root);

        let tarfile = work.path().join("tree.tar.gz");
        pack(&tarfile, &root).unwrap();
        let renamed = work.path().join("tree.bin");
        fs::rename(&tarfile, &renamed).unwrap();

        let out = work.path().join("out");
        unpack(&renamed, &out, false).unwrap();
        assert_sample_tree(&out);
    }

    #[test]
    fn test_pack_missing_root() {
        let work = tempfile::tempdir().unwrap();
        let tarfile = work.path().join("none.tar");
        let err = pack(&tarfile, work.path().join("missing")).unwrap_err();
        assert!(matches!(err, TarError::MissingRoot(_)));
        assert!(!err.is_checksum());
        assert!(!tarfile.exists());
    }

    #[test]
    fn test_unpack_missing_file() {
        let work = tempfile::tempdir().unwrap();
        let err = unpack(work.path().join("none.tar"), work.path().join("out"), false).unwrap_err();
        assert!(matches!(err, TarError::Io(_)));
    }
}
