//! Engine-wide limits and the block-size policy.
//!
//! A buffer is cut into fixed-size blocks before compression; every block is
//! an independent unit of work for the pool.  The block size is a multiple
//! of the element width so the shuffle filter lines up, bounded below to
//! amortize per-segment overhead and above to cap worst-case memory per
//! worker.  The last block may be shorter.

use crate::error::{Error, Result};

/// Hard ceiling on input size.  Keeps every offset and segment length well
/// inside 32-bit range regardless of platform word size.
pub const MAX_BUFFER_SIZE: usize = i32::MAX as usize - 32;

/// Largest element width the shuffle filter accepts.
pub const MAX_TYPESIZE: usize = 255;

/// Hard ceiling for the worker pool.
pub const MAX_THREADS: usize = 256;

/// Smallest nominal block the splitter produces (whole buffers smaller than
/// this become a single block).
pub const MIN_BLOCK_SIZE: usize = 4 * 1024;

/// Largest nominal block, independent of buffer length.
pub const MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Reject out-of-range compression parameters before any work begins.
pub fn validate_compress_input(len: usize, typesize: usize, level: u32) -> Result<()> {
    if len > MAX_BUFFER_SIZE {
        return Err(Error::InvalidInput(format!(
            "buffer of {len} bytes exceeds maximum of {MAX_BUFFER_SIZE}"
        )));
    }
    if level > 9 {
        return Err(Error::InvalidInput(format!(
            "compression level {level} out of range 0-9"
        )));
    }
    if typesize > MAX_TYPESIZE {
        return Err(Error::InvalidInput(format!(
            "typesize {typesize} exceeds maximum of {MAX_TYPESIZE}"
        )));
    }
    Ok(())
}

/// Pick the nominal block size for a buffer.
///
/// Higher levels get larger blocks (more context for the backend, fewer
/// segments); lower levels get smaller blocks (more parallel units, less
/// latency per block).  The result is clamped to
/// [`MIN_BLOCK_SIZE`]..=[`MAX_BLOCK_SIZE`], never exceeds `len`, and is a
/// multiple of `typesize` whenever more than one block is produced.
///
/// Returns 0 for an empty buffer.
pub fn block_size_for(len: usize, typesize: usize, level: u32) -> usize {
    if len == 0 {
        return 0;
    }
    let typesize = typesize.max(1);

    let step = match level {
        0..=3 => 32 * 1024,
        4..=6 => 128 * 1024,
        7..=8 => 512 * 1024,
        _ => 1024 * 1024,
    };

    let mut bs = step.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    if bs >= len {
        // Single block covering the whole buffer; alignment is irrelevant
        // because the trailing partial element is handled by the filter.
        return len;
    }

    // Round down to a whole number of elements, keeping at least one.
    bs -= bs % typesize;
    bs.max(typesize)
}

/// Number of blocks a buffer of `len` bytes splits into.
pub fn block_count_for(len: usize, block_size: usize) -> usize {
    if len == 0 {
        0
    } else {
        len.div_ceil(block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_no_blocks() {
        assert_eq!(block_size_for(0, 4, 5), 0);
        assert_eq!(block_count_for(0, 0), 0);
    }

    #[test]
    fn small_buffer_is_one_block() {
        let bs = block_size_for(100, 4, 5);
        assert_eq!(bs, 100);
        assert_eq!(block_count_for(100, bs), 1);
    }

    #[test]
    fn block_size_is_element_aligned() {
        for typesize in [1usize, 2, 3, 4, 7, 8, 16] {
            let bs = block_size_for(10_000_000, typesize, 5);
            assert_eq!(bs % typesize, 0, "typesize {typesize}");
            assert!(bs >= typesize);
            assert!(bs <= MAX_BLOCK_SIZE);
        }
    }

    #[test]
    fn block_size_grows_with_level() {
        let lo = block_size_for(100_000_000, 4, 1);
        let hi = block_size_for(100_000_000, 4, 9);
        assert!(lo < hi);
    }

    #[test]
    fn block_count_covers_buffer() {
        let len = 1_000_001;
        let bs = block_size_for(len, 4, 5);
        let n = block_count_for(len, bs);
        assert!(bs * n >= len);
        assert!(bs * (n - 1) < len);
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        assert!(validate_compress_input(MAX_BUFFER_SIZE + 1, 4, 5).is_err());
        assert!(validate_compress_input(MAX_BUFFER_SIZE, 4, 5).is_ok());
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        assert!(validate_compress_input(16, 4, 10).is_err());
        assert!(validate_compress_input(16, 4, 9).is_ok());
        assert!(validate_compress_input(16, 4, 0).is_ok());
    }

    #[test]
    fn oversized_typesize_is_rejected() {
        assert!(validate_compress_input(16, MAX_TYPESIZE + 1, 5).is_err());
        assert!(validate_compress_input(16, MAX_TYPESIZE, 5).is_ok());
    }
}
