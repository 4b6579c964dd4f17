//! ustar header codec
//!
//! Converts between [`TarHeader`] and its 512-byte on-disk block.
//!
//! ```text
//! offset  len  field
//!      0  100  name
//!    100    8  mode      "0000755\0"
//!    124   12  size      11 octal digits + NUL
//!    136   12  mtime     octal, unpadded
//!    148    8  checksum  6 octal digits + NUL + space
//!    156    1  typeflag
//!    257    6  magic     "ustar\0"
//!    345  155  prefix
//! ```
//!
//! The checksum covers bytes `[0, 148)` and `[156, 500)` with the checksum
//! field counted as eight spaces. Bytes `[500, 512)` are not part of the sum;
//! archives written by this crate rely on that range, so it must not change.

use std::ops::Range;

use crate::block::BLOCK_SIZE;
use crate::error::{TarError, TarResult};

pub const NAME_LEN: usize = 100;
pub const PREFIX_LEN: usize = 155;

const NAME_OFF: usize = 0;
const MODE_OFF: usize = 100;
const SIZE_OFF: usize = 124;
const MTIME_OFF: usize = 136;
const CHKSUM_OFF: usize = 148;
const TYPEFLAG_OFF: usize = 156;
const MAGIC_OFF: usize = 257;
const PREFIX_OFF: usize = 345;
const CHKSUM_END: usize = 500;

/// Permission bits written for every entry, independent of the source file.
pub const DEFAULT_MODE: &[u8; 8] = b"0000755\0";
pub const MAGIC: &[u8; 6] = b"ustar\0";

/// Largest payload the 11-digit octal size field can describe.
pub const MAX_SIZE: u64 = 0o77777777777;

/// Kind of an archive entry, stored as a single byte at offset 156
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFlag {
    /// `'0'`, or the legacy `'\0'`
    Regular,
    HardLink,
    Symlink,
    CharDevice,
    BlockDevice,
    Directory,
    Fifo,
    Contiguous,
    GlobalExtended,
    Extended,
    /// Any byte this codec does not know; extraction skips the payload
    Other(u8),
}

impl TypeFlag {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'0' | b'\0' => TypeFlag::Regular,
            b'1' => TypeFlag::HardLink,
            b'2' => TypeFlag::Symlink,
            b'3' => TypeFlag::CharDevice,
            b'4' => TypeFlag::BlockDevice,
            b'5' => TypeFlag::Directory,
            b'6' => TypeFlag::Fifo,
            b'7' => TypeFlag::Contiguous,
            b'g' => TypeFlag::GlobalExtended,
            b'x' => TypeFlag::Extended,
            other => TypeFlag::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            TypeFlag::Regular => b'0',
            TypeFlag::HardLink => b'1',
            TypeFlag::Symlink => b'2',
            TypeFlag::CharDevice => b'3',
            TypeFlag::BlockDevice => b'4',
            TypeFlag::Directory => b'5',
            TypeFlag::Fifo => b'6',
            TypeFlag::Contiguous => b'7',
            TypeFlag::GlobalExtended => b'g',
            TypeFlag::Extended => b'x',
            TypeFlag::Other(b) => b,
        }
    }
}

/// One decoded (or to-be-encoded) header record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    pub name: String,
    pub prefix: String,
    pub typeflag: TypeFlag,
    pub mode: u32,
    pub mtime: u64,
    pub size: u64,
    /// Checksum read from the block; zero for headers not yet encoded
    pub checksum: u32,
}

impl TarHeader {
    /// Create a header for `path`, splitting it across `prefix`/`name` when it
    /// does not fit in the name field. `mtime` starts at zero.
    pub fn new(path: &str, typeflag: TypeFlag, size: u64) -> Self {
        let (prefix, name) = split_path(path);
        Self {
            name,
            prefix,
            typeflag,
            mode: 0o755,
            mtime: 0,
            size,
            checksum: 0,
        }
    }

    /// Full relative path, `prefix` and `name` joined with `/`
    pub fn path(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else if self.prefix.ends_with('/') {
            format!("{}{}", self.prefix, self.name)
        } else {
            format!("{}/{}", self.prefix, self.name)
        }
    }

    /// Parse a header block, verifying its checksum first
    pub fn from_bytes(data: &[u8; BLOCK_SIZE]) -> TarResult<Self> {
        parse_tar_header(data)
    }

    /// Encode into a 512-byte block with a freshly computed checksum
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        create_tar_header(self)
    }
}

/// Split `path` into `(prefix, name)`.
///
/// Paths up to [`NAME_LEN`] bytes stay whole in `name`. Longer paths are cut
/// at the last `/` that leaves at most [`PREFIX_LEN`] bytes in front and a
/// non-empty name of at most [`NAME_LEN`] bytes behind it; a trailing `/`
/// stays with the name. When no such separator exists the whole path is
/// returned as the name and gets truncated to [`NAME_LEN`] bytes on encode.
pub fn split_path(path: &str) -> (String, String) {
    let bytes = path.as_bytes();
    if bytes.len() <= NAME_LEN {
        return (String::new(), path.to_string());
    }
    let last = (bytes.len() - 2).min(PREFIX_LEN);
    let split = bytes[..=last].iter().rposition(|&b| b == b'/');
    match split {
        Some(idx) if bytes.len() - idx - 1 <= NAME_LEN => {
            (path[..idx].to_string(), path[idx + 1..].to_string())
        }
        _ => (String::new(), path.to_string()),
    }
}

/// True when the name field (the first 100 bytes of a block) is blank,
/// which marks the end of the archive
pub fn is_blank_name(field: &[u8]) -> bool {
    let len = field.len().min(NAME_LEN);
    read_tar_str(field, 0..len).trim().is_empty()
}

/// Checksum of a header block: 256 (the checksum field as eight spaces) plus
/// every byte of `[0, 148)` and `[156, 500)`
pub fn calc_checksum(data: &[u8; BLOCK_SIZE]) -> u32 {
    let mut sum: u32 = 8 * b' ' as u32;
    for &b in data[..CHKSUM_OFF].iter() {
        sum += b as u32;
    }
    for &b in data[TYPEFLAG_OFF..CHKSUM_END].iter() {
        sum += b as u32;
    }
    sum
}

fn read_tar_str(data: &[u8], range: Range<usize>) -> String {
    String::from_utf8_lossy(&data[range])
        .trim_end_matches('\0')
        .to_string()
}

fn read_tar_octal(data: &[u8], range: Range<usize>) -> Option<u64> {
    let s = read_tar_str(data, range);
    let s = s.trim_matches(|c| c == ' ' || c == '\0');
    if s.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(s, 8).ok()
}

fn write_field(data: &mut [u8], offset: usize, len: usize, value: &[u8]) {
    let n = value.len().min(len);
    data[offset..offset + n].copy_from_slice(&value[..n]);
}

fn parse_tar_header(data: &[u8; BLOCK_SIZE]) -> TarResult<TarHeader> {
    let computed = calc_checksum(data);
    let stored_text = read_tar_str(data, CHKSUM_OFF..TYPEFLAG_OFF)
        .trim_matches(|c| c == ' ' || c == '\0')
        .to_string();
    let stored = u32::from_str_radix(&stored_text, 8).ok();
    if stored != Some(computed) {
        return Err(TarError::Checksum {
            stored: stored_text,
            computed,
        });
    }

    let size = read_tar_octal(data, SIZE_OFF..MTIME_OFF).ok_or_else(|| TarError::InvalidField {
        field: "size",
        value: read_tar_str(data, SIZE_OFF..MTIME_OFF),
    })?;

    Ok(TarHeader {
        name: read_tar_str(data, NAME_OFF..NAME_OFF + NAME_LEN),
        prefix: read_tar_str(data, PREFIX_OFF..PREFIX_OFF + PREFIX_LEN),
        typeflag: TypeFlag::from_byte(data[TYPEFLAG_OFF]),
        mode: read_tar_octal(data, MODE_OFF..MODE_OFF + 8).unwrap_or(0) as u32,
        mtime: read_tar_octal(data, MTIME_OFF..CHKSUM_OFF).unwrap_or(0),
        size,
        checksum: computed,
    })
}

fn create_tar_header(header: &TarHeader) -> [u8; BLOCK_SIZE] {
    let mut data = [0u8; BLOCK_SIZE];

    write_field(&mut data, NAME_OFF, NAME_LEN, header.name.as_bytes());
    write_field(&mut data, PREFIX_OFF, PREFIX_LEN, header.prefix.as_bytes());
    write_field(&mut data, MODE_OFF, 8, DEFAULT_MODE);

    let mtime = format!("{:o}", header.mtime);
    write_field(&mut data, MTIME_OFF, 12, mtime.as_bytes());

    // directories and symlinks keep an all-zero size field
    if !matches!(header.typeflag, TypeFlag::Directory | TypeFlag::Symlink) {
        let size = format!("{:011o}\0", header.size.min(MAX_SIZE));
        write_field(&mut data, SIZE_OFF, 12, size.as_bytes());
    }

    data[TYPEFLAG_OFF] = header.typeflag.as_byte();
    write_field(&mut data, MAGIC_OFF, MAGIC.len(), MAGIC);

    let checksum = format!("{:06o}\0 ", calc_checksum(&data));
    write_field(&mut data, CHKSUM_OFF, 8, checksum.as_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rewrite the checksum field so a hand-edited block verifies again
    fn reseal(data: &mut [u8; BLOCK_SIZE]) {
        let checksum = format!("{:06o}\0 ", calc_checksum(data));
        data[CHKSUM_OFF..TYPEFLAG_OFF].copy_from_slice(checksum.as_bytes());
    }

    #[test]
    fn encode_regular_file_test() {
        let mut header = TarHeader::new("a/b.txt", TypeFlag::Regular, 5);
        header.mtime = 0o1234567;
        let data = header.to_bytes();

        assert_eq!(&data[0..7], b"a/b.txt");
        assert_eq!(data[7], 0);
        assert_eq!(&data[100..108], b"0000755\0");
        assert_eq!(&data[124..136], b"00000000005\0");
        assert_eq!(&data[136..143], b"1234567");
        assert_eq!(data[156], b'0');
        assert_eq!(&data[257..263], b"ustar\0");
        assert_eq!(data[154], 0);
        assert_eq!(data[155], b' ');
        assert!(data[500..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_directory_and_symlink_leave_size_empty_test() {
        for flag in [TypeFlag::Directory, TypeFlag::Symlink] {
            let data = TarHeader::new("dir/", flag, 42).to_bytes();
            assert!(data[124..136].iter().all(|&b| b == 0));
            let decoded = TarHeader::from_bytes(&data).unwrap();
            assert_eq!(decoded.size, 0);
            assert_eq!(decoded.typeflag, flag);
        }
    }

    #[test]
    fn checksum_roundtrip_test() {
        let header = TarHeader::new("hello.txt", TypeFlag::Regular, 12);
        let data = header.to_bytes();
        let stored = std::str::from_utf8(&data[148..154]).unwrap();
        assert_eq!(u32::from_str_radix(stored, 8).unwrap(), calc_checksum(&data));

        let decoded = TarHeader::from_bytes(&data).unwrap();
        assert_eq!(decoded.name, "hello.txt");
        assert_eq!(decoded.size, 12);
        assert_eq!(decoded.mode, 0o755);
        assert_eq!(decoded.typeflag, TypeFlag::Regular);
        assert_eq!(decoded.checksum, calc_checksum(&data));
    }

    #[test]
    fn checksum_detects_single_byte_corruption_test() {
        let mut header = TarHeader::new("dir/some/file.bin", TypeFlag::Regular, 777);
        header.mtime = 1_700_000_000;
        let data = header.to_bytes();

        let covered = (0..CHKSUM_OFF).chain(TYPEFLAG_OFF..CHKSUM_END);
        for i in covered {
            let mut corrupted = data;
            corrupted[i] ^= 0x01;
            match TarHeader::from_bytes(&corrupted) {
                Err(TarError::Checksum { computed, .. }) => {
                    assert_eq!(computed, calc_checksum(&corrupted));
                }
                other => panic!("byte {} corrupted but decode gave {:?}", i, other),
            }
        }
    }

    #[test]
    fn checksum_ignores_trailing_bytes_test() {
        let mut data = TarHeader::new("x", TypeFlag::Regular, 1).to_bytes();
        data[505] = 0xff;
        data[511] = 0x7f;
        assert!(TarHeader::from_bytes(&data).is_ok());
    }

    #[test]
    fn checksum_error_reports_both_values_test() {
        let mut data = TarHeader::new("x", TypeFlag::Regular, 1).to_bytes();
        data[148..156].copy_from_slice(b"000001\0 ");
        let err = TarHeader::from_bytes(&data).unwrap_err();
        assert!(err.is_checksum());
        match err {
            TarError::Checksum { stored, computed } => {
                assert_eq!(stored, "000001");
                assert_eq!(computed, calc_checksum(&data));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn short_path_stays_in_name_test() {
        let path = "p".repeat(NAME_LEN);
        let (prefix, name) = split_path(&path);
        assert!(prefix.is_empty());
        assert_eq!(name, path);
    }

    #[test]
    fn long_path_split_test() {
        let path = format!("{}/{}/{}", "a".repeat(60), "b".repeat(60), "c.txt");
        let header = TarHeader::new(&path, TypeFlag::Regular, 0);
        assert!(!header.prefix.is_empty());
        assert!(header.prefix.len() <= PREFIX_LEN);
        assert!(header.name.len() <= NAME_LEN);
        assert_eq!(header.path(), path);

        let decoded = TarHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.prefix, header.prefix);
        assert_eq!(decoded.name, header.name);
        assert_eq!(decoded.path(), path);
    }

    #[test]
    fn long_directory_path_keeps_trailing_separator_test() {
        let path = format!("{}/{}/", "d".repeat(90), "e".repeat(30));
        let (prefix, name) = split_path(&path);
        assert_eq!(prefix, "d".repeat(90));
        assert_eq!(name, format!("{}/", "e".repeat(30)));

        let header = TarHeader::new(&path, TypeFlag::Directory, 0);
        let decoded = TarHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.path(), path);
    }

    #[test]
    fn unsplittable_path_is_truncated_test() {
        let path = "n".repeat(150);
        let header = TarHeader::new(&path, TypeFlag::Regular, 0);
        assert!(header.prefix.is_empty());

        let decoded = TarHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded.name, "n".repeat(NAME_LEN));
        assert!(decoded.prefix.is_empty());
    }

    #[test]
    fn typeflag_test() {
        assert_eq!(TypeFlag::from_byte(b'\0'), TypeFlag::Regular);
        assert_eq!(TypeFlag::from_byte(b'0'), TypeFlag::Regular);
        assert_eq!(TypeFlag::from_byte(b'5'), TypeFlag::Directory);
        assert_eq!(TypeFlag::from_byte(b'g'), TypeFlag::GlobalExtended);
        assert_eq!(TypeFlag::from_byte(b'Z'), TypeFlag::Other(b'Z'));
        assert_eq!(TypeFlag::Other(b'Z').as_byte(), b'Z');

        for b in [b'1', b'2', b'3', b'4', b'6', b'7', b'x'] {
            assert_eq!(TypeFlag::from_byte(b).as_byte(), b);
        }
    }

    #[test]
    fn invalid_size_field_test() {
        let mut data = TarHeader::new("bad.txt", TypeFlag::Regular, 0).to_bytes();
        data[124..136].copy_from_slice(b"0000000009z\0");
        reseal(&mut data);
        match TarHeader::from_bytes(&data) {
            Err(TarError::InvalidField { field, .. }) => assert_eq!(field, "size"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_size_field_is_zero_test() {
        let mut data = TarHeader::new("empty.txt", TypeFlag::Regular, 0).to_bytes();
        data[124..136].fill(0);
        reseal(&mut data);
        assert_eq!(TarHeader::from_bytes(&data).unwrap().size, 0);
    }

    #[test]
    fn blank_name_test() {
        assert!(is_blank_name(&[0u8; 100]));
        assert!(is_blank_name(&[0u8; BLOCK_SIZE]));
        let data = TarHeader::new("x", TypeFlag::Regular, 0).to_bytes();
        assert!(!is_blank_name(&data[..100]));
    }
}
