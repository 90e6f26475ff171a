//! Byte-transposition filter.
//!
//! For a buffer holding fixed-width elements, `shuffle` groups all first
//! bytes of every element together, then all second bytes, and so on.  Data
//! such as arrays of small-range integers or slowly varying floats becomes
//! long runs of near-identical bytes, which the backend codec exploits far
//! better than the interleaved original.
//!
//! Both directions are pure and stateless.  A trailing partial element
//! (when the buffer length is not a multiple of `typesize`) is copied
//! through verbatim at the end of the output, so
//! `unshuffle(shuffle(x)) == x` holds for every input length.

/// Transpose `src` into `dst` by element byte position.
///
/// `dst` must be exactly as long as `src`.  `typesize <= 1` degenerates to
/// a plain copy.
pub fn shuffle(typesize: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 {
        dst.copy_from_slice(src);
        return;
    }

    let elems = src.len() / typesize;
    let whole = elems * typesize;
    for j in 0..typesize {
        let plane = &mut dst[j * elems..(j + 1) * elems];
        for (i, out) in plane.iter_mut().enumerate() {
            *out = src[i * typesize + j];
        }
    }
    dst[whole..].copy_from_slice(&src[whole..]);
}

/// Exact inverse of [`shuffle`].
pub fn unshuffle(typesize: usize, src: &[u8], dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if typesize <= 1 {
        dst.copy_from_slice(src);
        return;
    }

    let elems = src.len() / typesize;
    let whole = elems * typesize;
    for j in 0..typesize {
        let plane = &src[j * elems..(j + 1) * elems];
        for (i, val) in plane.iter().enumerate() {
            dst[i * typesize + j] = *val;
        }
    }
    dst[whole..].copy_from_slice(&src[whole..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(typesize: usize, data: &[u8]) {
        let mut shuffled = vec![0u8; data.len()];
        let mut restored = vec![0u8; data.len()];
        shuffle(typesize, data, &mut shuffled);
        unshuffle(typesize, &shuffled, &mut restored);
        assert_eq!(restored, data, "typesize {typesize}, len {}", data.len());
    }

    #[test]
    fn shuffle_groups_byte_planes() {
        // Two 4-byte elements: planes come out contiguous.
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = [0u8; 8];
        shuffle(4, &src, &mut dst);
        assert_eq!(dst, [1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn typesize_one_is_identity() {
        let src: Vec<u8> = (0..=255).collect();
        let mut dst = vec![0u8; src.len()];
        shuffle(1, &src, &mut dst);
        assert_eq!(dst, src);
    }

    #[test]
    fn trailing_partial_element_passes_through() {
        // 10 bytes with typesize 4: two whole elements plus a 2-byte tail.
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut dst = [0u8; 10];
        shuffle(4, &src, &mut dst);
        assert_eq!(&dst[8..], &[9, 10]);
        roundtrip(4, &src);
    }

    #[test]
    fn involution_over_sizes_and_typesizes() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        for typesize in [1usize, 2, 3, 4, 5, 8, 16, 255] {
            for len in [0usize, 1, 7, 16, 255, 256, 1000, 4096] {
                roundtrip(typesize, &data[..len]);
            }
        }
    }
}
