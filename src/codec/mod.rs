//! Codec backend registry.
//!
//! The engine compresses each block through one of a closed set of lossless
//! byte codecs.  The discriminant written into the frame header is frozen:
//! a value is never reused, and parsers reject unknown values instead of
//! guessing.  Backends cannot self-terminate, so decoding always receives
//! the exact original block length from the segment table.
//!
//! The adapter enforces the store-if-not-smaller policy: a block whose
//! encoded form is not strictly smaller than the input is kept verbatim and
//! flagged raw in the segment table.  Raw segments are copied on decode and
//! never routed through a backend decoder.  Level 0 short-circuits to the
//! raw path without invoking any backend.

use std::io::{Read, Write};

use crate::error::{Error, Result};

// ── CodecId ──────────────────────────────────────────────────────────────────

/// Backend discriminant.  The `u8` value is the on-wire identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    /// No backend — every segment is stored raw.
    Memcpy = 0,
    /// LZ4 block format — maximum throughput, lower ratio (default).
    Lz4 = 1,
    /// Zstandard — balanced speed/ratio.
    Zstd = 2,
    /// Brotli — high ratio, slow.
    Brotli = 3,
    /// LZMA — highest ratio, slowest backend.
    Lzma = 4,
}

impl CodecId {
    /// On-wire discriminant.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Resolve an on-wire discriminant.  `None` for values this build does
    /// not recognise.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CodecId::Memcpy),
            1 => Some(CodecId::Lz4),
            2 => Some(CodecId::Zstd),
            3 => Some(CodecId::Brotli),
            4 => Some(CodecId::Lzma),
            _ => None,
        }
    }

    /// Human-readable name (diagnostics and CLI only — never parsed from a
    /// frame).
    pub fn name(self) -> &'static str {
        match self {
            CodecId::Memcpy => "memcpy",
            CodecId::Lz4 => "lz4",
            CodecId::Zstd => "zstd",
            CodecId::Brotli => "brotli",
            CodecId::Lzma => "lzma",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memcpy" | "none" => Some(CodecId::Memcpy),
            "lz4" => Some(CodecId::Lz4),
            "zstd" => Some(CodecId::Zstd),
            "brotli" => Some(CodecId::Brotli),
            "lzma" => Some(CodecId::Lzma),
            _ => None,
        }
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn id(&self) -> CodecId;
    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>>;
    /// Decode a payload whose decompressed size is known to be exactly
    /// `original_len`.
    fn decode(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>>;
}

// ── Built-in backends ────────────────────────────────────────────────────────

pub struct MemcpyCodec;
impl Codec for MemcpyCodec {
    fn id(&self) -> CodecId {
        CodecId::Memcpy
    }
    fn encode(&self, data: &[u8], _: u32) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decode(&self, data: &[u8], _: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn id(&self) -> CodecId {
        CodecId::Lz4
    }
    fn encode(&self, data: &[u8], _: u32) -> Result<Vec<u8>> {
        // No size prefix: the segment table already records both lengths.
        Ok(lz4_flex::block::compress(data))
    }
    fn decode(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        lz4_flex::block::decompress(data, original_len)
            .map_err(|e| Error::Backend(format!("lz4: {e}")))
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn id(&self) -> CodecId {
        CodecId::Zstd
    }
    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        zstd::bulk::compress(data, zstd_level(level))
            .map_err(|e| Error::Backend(format!("zstd: {e}")))
    }
    fn decode(&self, data: &[u8], original_len: usize) -> Result<Vec<u8>> {
        zstd::bulk::decompress(data, original_len)
            .map_err(|e| Error::Backend(format!("zstd: {e}")))
    }
}

pub struct BrotliCodec;
impl Codec for BrotliCodec {
    fn id(&self) -> CodecId {
        CodecId::Brotli
    }
    fn encode(&self, data: &[u8], level: u32) -> Result<Vec<u8>> {
        let quality = level.clamp(0, 11);
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, quality, 22);
            w.write_all(data)
                .map_err(|e| Error::Backend(format!("brotli: {e}")))?;
        }
        Ok(out)
    }
    fn decode(&self, data: &[u8], _: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut out)
            .map_err(|e| Error::Backend(format!("brotli: {e}")))?;
        Ok(out)
    }
}

pub struct LzmaCodec;
impl Codec for LzmaCodec {
    fn id(&self) -> CodecId {
        CodecId::Lzma
    }
    fn encode(&self, data: &[u8], _: u32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        lzma_rs::lzma_compress(&mut std::io::Cursor::new(data), &mut out)
            .map_err(|e| Error::Backend(format!("lzma: {e}")))?;
        Ok(out)
    }
    fn decode(&self, data: &[u8], _: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        lzma_rs::lzma_decompress(&mut std::io::Cursor::new(data), &mut out)
            .map_err(|e| Error::Backend(format!("lzma: {e}")))?;
        Ok(out)
    }
}

/// Map the 0-9 effort dial onto zstd's native 1-19 range.
fn zstd_level(level: u32) -> i32 {
    ((level as i32) * 2 + 1).min(19)
}

/// Resolve a CodecId to its backend.  The set is closed, so this cannot
/// fail.
pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::Memcpy => Box::new(MemcpyCodec),
        CodecId::Lz4 => Box::new(Lz4Codec),
        CodecId::Zstd => Box::new(ZstdCodec),
        CodecId::Brotli => Box::new(BrotliCodec),
        CodecId::Lzma => Box::new(LzmaCodec),
    }
}

// ── Segment adapter ──────────────────────────────────────────────────────────

/// One block's encoded form, before the frame is assembled.
#[derive(Debug)]
pub struct EncodedSegment {
    pub payload: Vec<u8>,
    /// Stored verbatim: compression was skipped or did not shrink the block.
    pub raw: bool,
}

/// Encode one block under the store-if-not-smaller policy.
pub fn encode_segment(codec: CodecId, level: u32, block: &[u8]) -> Result<EncodedSegment> {
    if level == 0 || codec == CodecId::Memcpy || block.is_empty() {
        return Ok(EncodedSegment {
            payload: block.to_vec(),
            raw: true,
        });
    }

    let encoded = get_codec(codec).encode(block, level)?;
    if encoded.len() < block.len() {
        Ok(EncodedSegment {
            payload: encoded,
            raw: false,
        })
    } else {
        Ok(EncodedSegment {
            payload: block.to_vec(),
            raw: true,
        })
    }
}

/// Decode one segment back to exactly `original_len` bytes.
pub fn decode_segment(
    codec: CodecId,
    payload: &[u8],
    raw: bool,
    original_len: usize,
) -> Result<Vec<u8>> {
    if raw {
        // The frame parser already checked the length; keep the invariant
        // local as well.
        if payload.len() != original_len {
            return Err(Error::Backend(format!(
                "raw segment is {} bytes, expected {original_len}",
                payload.len()
            )));
        }
        return Ok(payload.to_vec());
    }

    let decoded = get_codec(codec).decode(payload, original_len)?;
    if decoded.len() != original_len {
        return Err(Error::Backend(format!(
            "segment decoded to {} bytes, expected {original_len}",
            decoded.len()
        )));
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_frozen() {
        for id in [
            CodecId::Memcpy,
            CodecId::Lz4,
            CodecId::Zstd,
            CodecId::Brotli,
            CodecId::Lzma,
        ] {
            assert_eq!(CodecId::from_u8(id.as_u8()), Some(id));
            assert_eq!(CodecId::from_name(id.name()), Some(id));
        }
        assert_eq!(CodecId::from_u8(0xFF), None);
    }

    #[test]
    fn level_zero_never_invokes_a_backend() {
        let block = vec![7u8; 1024];
        let seg = encode_segment(CodecId::Zstd, 0, &block).unwrap();
        assert!(seg.raw);
        assert_eq!(seg.payload, block);
    }

    #[test]
    fn compressible_block_is_encoded() {
        let block = vec![0u8; 16 * 1024];
        for codec in [CodecId::Lz4, CodecId::Zstd, CodecId::Brotli, CodecId::Lzma] {
            let seg = encode_segment(codec, 5, &block).unwrap();
            assert!(!seg.raw, "{}", codec.name());
            assert!(seg.payload.len() < block.len());
            let back = decode_segment(codec, &seg.payload, seg.raw, block.len()).unwrap();
            assert_eq!(back, block);
        }
    }

    #[test]
    fn incompressible_block_is_stored_raw() {
        let block: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let seg = encode_segment(CodecId::Lz4, 9, &block).unwrap();
        assert!(seg.raw);
        assert_eq!(seg.payload.len(), block.len());
    }

    #[test]
    fn decode_length_mismatch_is_a_backend_error() {
        let block = vec![0u8; 4096];
        let seg = encode_segment(CodecId::Zstd, 5, &block).unwrap();
        assert!(decode_segment(CodecId::Zstd, &seg.payload, false, block.len() - 1).is_err());
    }
}
