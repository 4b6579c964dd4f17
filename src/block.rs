//! Block arithmetic shared by the writer and the reader.

/// Every header and every padded payload is a multiple of this size.
pub const BLOCK_SIZE: usize = 512;

/// An all-zero block, used for padding and as the end-of-archive marker.
pub static ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Number of zero bytes needed after `len` bytes to reach a block boundary
pub fn padding_for(len: u64) -> usize {
    let rem = (len % BLOCK_SIZE as u64) as usize;
    (BLOCK_SIZE - rem) % BLOCK_SIZE
}

/// Rounds `len` up to the next multiple of [`BLOCK_SIZE`]
pub fn round_up(len: u64) -> u64 {
    len + padding_for(len) as u64
}
