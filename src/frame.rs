//! Frame serialization and validated parsing.
//!
//! A frame is the single self-describing artifact produced by `compress`:
//!
//! ```text
//! magic(4) version(1) flags(1) codec(1) typesize(4 LE) original_len(8 LE)
//! block_size(4 LE) block_count(4 LE)
//! segment table: block_count × [len(4 LE) flags(1) crc32(4 LE)]
//! segment payloads, concatenated in block order
//! ```
//!
//! Parsing checks the magic and version before trusting any size field, and
//! every size invariant before any payload slice is handed to a backend
//! decoder, so a truncated or adversarial frame can never cause an
//! over-read or an oversized allocation.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::CodecId;
use crate::error::{Error, Result};
use crate::split::{MAX_BUFFER_SIZE, MAX_TYPESIZE};

pub const MAGIC: &[u8; 4] = b".spk";
pub const VERSION: u8 = 1;

/// Frame flag bit: blocks were byte-shuffled before encoding.
pub const FLAG_SHUFFLE: u8 = 0b0000_0001;
/// Segment flag bit: payload is the block stored verbatim.
pub const SEG_FLAG_RAW: u8 = 0b0000_0001;

pub const HEADER_SIZE: usize = 4 + 1 + 1 + 1 + 4 + 8 + 4 + 4;
pub const SEGMENT_ENTRY_SIZE: usize = 4 + 1 + 4;

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub shuffle: bool,
    pub codec: CodecId,
    pub typesize: u32,
    pub original_len: u64,
    pub block_size: u32,
    pub block_count: u32,
}

impl FrameHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(if self.shuffle { FLAG_SHUFFLE } else { 0 })?;
        writer.write_u8(self.codec.as_u8())?;
        writer.write_u32::<LittleEndian>(self.typesize)?;
        writer.write_u64::<LittleEndian>(self.original_len)?;
        writer.write_u32::<LittleEndian>(self.block_size)?;
        writer.write_u32::<LittleEndian>(self.block_count)?;
        Ok(())
    }

    /// Parse a header, failing fast on the magic/version tag before reading
    /// any size field.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::CorruptFrame("truncated header".to_string()))?;
        if &magic != MAGIC {
            return Err(Error::CorruptFrame("bad magic".to_string()));
        }
        let version = read_u8(&mut reader)?;
        if version != VERSION {
            return Err(Error::CorruptFrame(format!(
                "unsupported version {version}"
            )));
        }
        let flags = read_u8(&mut reader)?;
        if flags & !FLAG_SHUFFLE != 0 {
            return Err(Error::CorruptFrame(format!(
                "reserved flag bits set: {flags:#04x}"
            )));
        }
        let codec_byte = read_u8(&mut reader)?;
        let codec = CodecId::from_u8(codec_byte)
            .ok_or_else(|| Error::CorruptFrame(format!("unknown codec id {codec_byte}")))?;

        let typesize = read_u32(&mut reader)?;
        let original_len = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::CorruptFrame("truncated header".to_string()))?;
        let block_size = read_u32(&mut reader)?;
        let block_count = read_u32(&mut reader)?;

        Ok(Self {
            shuffle: flags & FLAG_SHUFFLE != 0,
            codec,
            typesize,
            original_len,
            block_size,
            block_count,
        })
    }
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    reader
        .read_u8()
        .map_err(|_| Error::CorruptFrame("truncated header".to_string()))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::CorruptFrame("truncated header".to_string()))
}

// ── Segment table ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Stored payload length in bytes.
    pub len: u32,
    /// Payload is the block verbatim (compression skipped or not smaller).
    pub raw: bool,
    /// CRC32 of the stored payload.
    pub crc: u32,
}

impl SegmentEntry {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.len)?;
        writer.write_u8(if self.raw { SEG_FLAG_RAW } else { 0 })?;
        writer.write_u32::<LittleEndian>(self.crc)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let len = read_u32(&mut reader)?;
        let flags = read_u8(&mut reader)?;
        if flags & !SEG_FLAG_RAW != 0 {
            return Err(Error::CorruptFrame(format!(
                "reserved segment flag bits set: {flags:#04x}"
            )));
        }
        let crc = read_u32(&mut reader)?;
        Ok(Self {
            len,
            raw: flags & SEG_FLAG_RAW != 0,
            crc,
        })
    }
}

// ── Whole-frame parsing ──────────────────────────────────────────────────────

/// A fully validated frame, borrowing payload slices from the input.
#[derive(Debug)]
pub struct ParsedFrame<'a> {
    pub header: FrameHeader,
    pub entries: Vec<SegmentEntry>,
    pub payloads: Vec<&'a [u8]>,
}

impl ParsedFrame<'_> {
    /// Original length of block `i`, derived from the header geometry.
    pub fn block_len(&self, i: usize) -> usize {
        block_len_at(&self.header, i)
    }
}

fn block_len_at(header: &FrameHeader, i: usize) -> usize {
    let bs = u64::from(header.block_size);
    let n = u64::from(header.block_count);
    if i as u64 + 1 == n {
        (header.original_len - bs * (n - 1)) as usize
    } else {
        header.block_size as usize
    }
}

/// Parse and cross-check a frame.
///
/// After this returns, every payload slice is in bounds, the segment table
/// is internally consistent with the header geometry, and raw segments have
/// exactly their block's length.  Payload *contents* are still unverified;
/// checksums are the decoder's per-segment concern.
pub fn parse(frame: &[u8]) -> Result<ParsedFrame<'_>> {
    let mut cursor = io::Cursor::new(frame);
    let header = FrameHeader::read(&mut cursor)?;

    if header.original_len > MAX_BUFFER_SIZE as u64 {
        return Err(Error::CorruptFrame(format!(
            "declared length {} exceeds maximum buffer size",
            header.original_len
        )));
    }
    if header.typesize == 0 || header.typesize as usize > MAX_TYPESIZE {
        return Err(Error::CorruptFrame(format!(
            "typesize {} out of range",
            header.typesize
        )));
    }

    // Geometry: block count must match ceil(original_len / block_size).
    let expected_blocks = if header.original_len == 0 {
        0
    } else {
        if header.block_size == 0 {
            return Err(Error::CorruptFrame(
                "zero block size for non-empty frame".to_string(),
            ));
        }
        header.original_len.div_ceil(header.block_size as u64)
    };
    if u64::from(header.block_count) != expected_blocks {
        return Err(Error::CorruptFrame(format!(
            "block count {} does not match declared length (expected {expected_blocks})",
            header.block_count
        )));
    }

    let n = header.block_count as usize;
    let table_end = HEADER_SIZE as u64 + (n as u64) * SEGMENT_ENTRY_SIZE as u64;
    if (frame.len() as u64) < table_end {
        return Err(Error::CorruptFrame("truncated segment table".to_string()));
    }

    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        entries.push(SegmentEntry::read(&mut cursor)?);
    }

    // Payload extents: the declared segment lengths must account for every
    // remaining byte of the frame, exactly.
    let payload_total: u64 = entries.iter().map(|e| u64::from(e.len)).sum();
    if table_end + payload_total != frame.len() as u64 {
        return Err(Error::CorruptFrame(format!(
            "segment lengths sum to {payload_total} but frame has {} payload bytes",
            frame.len() as u64 - table_end
        )));
    }

    let mut offset = table_end as usize;
    let mut payloads = Vec::with_capacity(n);
    for (i, entry) in entries.iter().enumerate() {
        let len = entry.len as usize;
        let block_len = block_len_at(&header, i);
        if entry.raw {
            if len != block_len {
                return Err(Error::CorruptFrame(format!(
                    "raw segment {i} is {len} bytes, block is {block_len}"
                )));
            }
        } else if len >= block_len {
            // A compressed segment is strictly smaller than its block by
            // construction; anything else cannot have come from the writer.
            return Err(Error::CorruptFrame(format!(
                "compressed segment {i} is {len} bytes for a {block_len}-byte block"
            )));
        }
        payloads.push(&frame[offset..offset + len]);
        offset += len;
    }

    Ok(ParsedFrame {
        header,
        entries,
        payloads,
    })
}
