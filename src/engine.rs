//! Public engine API and resource lifecycle.
//!
//! An [`Engine`] owns the worker pool and exposes the synchronous
//! `compress`/`decompress` pair.  A call either returns a complete
//! frame/buffer or an error; no partial result is ever observable.
//! Concurrent calls may share one engine — each call owns its own block
//! results, and pool reconfiguration never disturbs calls already in
//! flight.
//!
//! The free functions at the bottom wrap a lazily-created process-wide
//! default engine for embedders that do not want to manage a handle.

use std::borrow::Cow;
use std::sync::OnceLock;

use crc32fast::Hasher;
use log::debug;

use crate::codec::{decode_segment, encode_segment, CodecId};
use crate::error::{Error, Result};
use crate::frame::{self, FrameHeader, SegmentEntry, HEADER_SIZE, SEGMENT_ENTRY_SIZE};
use crate::pool::{run_ordered, WorkerPool};
use crate::shuffle::{shuffle, unshuffle};
use crate::split::{
    block_count_for, block_size_for, validate_compress_input, MAX_THREADS,
};

// ── CompressOptions ──────────────────────────────────────────────────────────

/// Per-call compression configuration.  Constructed once per call and never
/// mutated; the thread count lives on the engine, not here.
#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    /// Byte width of one logical element.  Only aligns the shuffle filter;
    /// 0 is treated as 1.
    pub typesize: usize,
    /// Effort dial, 0 (store) to 9 (maximum ratio).
    pub level: u32,
    /// Apply the byte-shuffle filter before encoding.
    pub shuffle: bool,
    /// Backend codec for non-raw segments.
    pub codec: CodecId,
}

impl CompressOptions {
    /// Defaults matching the library's classic surface: level 5, shuffle
    /// on, LZ4 backend.
    pub fn new(typesize: usize) -> Self {
        Self {
            typesize,
            level: 5,
            shuffle: true,
            codec: CodecId::Lz4,
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn codec(mut self, codec: CodecId) -> Self {
        self.codec = codec;
        self
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct Engine {
    pool: WorkerPool,
}

impl Engine {
    /// Engine with one worker per detected core, capped at [`MAX_THREADS`].
    pub fn new() -> Self {
        Self {
            pool: WorkerPool::new(detect_core_count().min(MAX_THREADS)),
        }
    }

    pub fn with_threads(threads: usize) -> Result<Self> {
        validate_thread_count(threads)?;
        Ok(Self {
            pool: WorkerPool::new(threads),
        })
    }

    /// Compress `src` into a self-describing frame.
    ///
    /// Fails with `InvalidInput` before any work if the buffer or the
    /// options are out of range; otherwise always succeeds.  In the worst
    /// case every block is stored raw and the frame is the input plus
    /// header and table overhead.
    pub fn compress(&self, src: &[u8], opts: &CompressOptions) -> Result<Vec<u8>> {
        validate_compress_input(src.len(), opts.typesize, opts.level)?;

        let typesize = opts.typesize.max(1);
        let shuffle_active = opts.shuffle && typesize > 1;
        let block_size = block_size_for(src.len(), typesize, opts.level);
        let block_count = block_count_for(src.len(), block_size);

        let header = FrameHeader {
            shuffle: shuffle_active,
            codec: opts.codec,
            typesize: typesize as u32,
            original_len: src.len() as u64,
            block_size: block_size as u32,
            block_count: block_count as u32,
        };

        if block_count == 0 {
            let mut out = Vec::with_capacity(HEADER_SIZE);
            header
                .write(&mut out)
                .map_err(|e| Error::Backend(e.to_string()))?;
            return Ok(out);
        }

        let blocks: Vec<&[u8]> = src.chunks(block_size).collect();
        let snapshot = self.pool.snapshot()?;
        let level = opts.level;
        let codec = opts.codec;

        let segments: Vec<(SegmentEntry, Vec<u8>)> =
            run_ordered(snapshot.as_deref(), block_count, |i| {
                let block = blocks[i];
                let work: Cow<'_, [u8]> = if shuffle_active {
                    let mut tmp = vec![0u8; block.len()];
                    shuffle(typesize, block, &mut tmp);
                    Cow::Owned(tmp)
                } else {
                    Cow::Borrowed(block)
                };
                let seg = encode_segment(codec, level, &work)?;
                let mut hasher = Hasher::new();
                hasher.update(&seg.payload);
                let entry = SegmentEntry {
                    len: seg.payload.len() as u32,
                    raw: seg.raw,
                    crc: hasher.finalize(),
                };
                Ok((entry, seg.payload))
            })?;

        let payload_total: usize = segments.iter().map(|(_, p)| p.len()).sum();
        let mut out =
            Vec::with_capacity(HEADER_SIZE + block_count * SEGMENT_ENTRY_SIZE + payload_total);
        header
            .write(&mut out)
            .map_err(|e| Error::Backend(e.to_string()))?;
        for (entry, _) in &segments {
            entry
                .write(&mut out)
                .map_err(|e| Error::Backend(e.to_string()))?;
        }
        for (_, payload) in &segments {
            out.extend_from_slice(payload);
        }

        debug!(
            "compressed {} bytes to {} ({} blocks of {}, codec {})",
            src.len(),
            out.len(),
            block_count,
            block_size,
            opts.codec.name(),
        );
        Ok(out)
    }

    /// Decompress a frame back to the original buffer.
    ///
    /// Fails with `CorruptFrame` if header or segment-table validation
    /// fails (before any segment is decoded) and with `Backend` if an
    /// individual segment fails its checksum or decode.  On failure no
    /// partial buffer is returned.
    pub fn decompress(&self, frame_bytes: &[u8]) -> Result<Vec<u8>> {
        let parsed = frame::parse(frame_bytes)?;
        let header = parsed.header;
        let typesize = header.typesize as usize;
        let block_count = parsed.entries.len();

        if block_count == 0 {
            return Ok(Vec::new());
        }

        let snapshot = self.pool.snapshot()?;
        let blocks: Vec<Vec<u8>> = run_ordered(snapshot.as_deref(), block_count, |i| {
            let entry = &parsed.entries[i];
            let payload = parsed.payloads[i];

            let mut hasher = Hasher::new();
            hasher.update(payload);
            if hasher.finalize() != entry.crc {
                return Err(Error::Backend(format!("segment {i}: checksum mismatch")));
            }

            let block_len = parsed.block_len(i);
            let data = decode_segment(header.codec, payload, entry.raw, block_len)?;
            if header.shuffle && typesize > 1 {
                let mut out = vec![0u8; data.len()];
                unshuffle(typesize, &data, &mut out);
                Ok(out)
            } else {
                Ok(data)
            }
        })?;

        let mut out = Vec::with_capacity(header.original_len as usize);
        for block in &blocks {
            out.extend_from_slice(block);
        }

        debug!(
            "decompressed {} bytes from {} ({} blocks)",
            out.len(),
            frame_bytes.len(),
            block_count,
        );
        Ok(out)
    }

    /// Reconfigure the worker pool.  Returns the previous thread count.
    /// Calls already in flight finish on the pool they started with.
    pub fn set_thread_count(&self, threads: usize) -> Result<usize> {
        validate_thread_count(threads)?;
        Ok(self.pool.resize(threads))
    }

    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    /// Tear down the pool.  Subsequent calls recreate it lazily.
    pub fn release_resources(&self) {
        self.pool.release();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_thread_count(threads: usize) -> Result<()> {
    if threads == 0 || threads > MAX_THREADS {
        return Err(Error::InvalidInput(format!(
            "thread count {threads} out of range 1-{MAX_THREADS}"
        )));
    }
    Ok(())
}

// ── Process-wide default instance ────────────────────────────────────────────

static DEFAULT_ENGINE: OnceLock<Engine> = OnceLock::new();

/// The shared default engine, created on first use with one worker per
/// detected core.
pub fn default_engine() -> &'static Engine {
    DEFAULT_ENGINE.get_or_init(Engine::new)
}

/// Compress with the default engine and the default LZ4 backend.
pub fn compress(src: &[u8], typesize: usize, level: u32, shuffle: bool) -> Result<Vec<u8>> {
    let opts = CompressOptions::new(typesize).level(level).shuffle(shuffle);
    default_engine().compress(src, &opts)
}

/// Decompress with the default engine.
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>> {
    default_engine().decompress(frame)
}

/// Reconfigure the default engine's pool; returns the previous count.
pub fn set_thread_count(threads: usize) -> Result<usize> {
    default_engine().set_thread_count(threads)
}

/// Tear down the default engine's pool.
pub fn release_resources() {
    default_engine().release_resources();
}

/// Number of cores reported by the operating system.  The default thread
/// count at engine creation.
pub fn detect_core_count() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_roundtrips() {
        let engine = Engine::with_threads(2).unwrap();
        let frame = engine.compress(&[], &CompressOptions::new(4)).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(engine.decompress(&frame).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn typesize_zero_is_treated_as_one() {
        let engine = Engine::with_threads(1).unwrap();
        let data = b"typesize zero behaves like a plain byte stream".repeat(50);
        let frame = engine.compress(&data, &CompressOptions::new(0)).unwrap();
        assert_eq!(engine.decompress(&frame).unwrap(), data);
    }

    #[test]
    fn thread_count_lifecycle() {
        let engine = Engine::with_threads(2).unwrap();
        assert_eq!(engine.set_thread_count(4).unwrap(), 2);
        assert_eq!(engine.thread_count(), 4);
        assert!(engine.set_thread_count(0).is_err());
        assert!(engine.set_thread_count(MAX_THREADS + 1).is_err());
        engine.release_resources();
        // Pool is rebuilt lazily after release.
        let data = vec![1u8; 100_000];
        let frame = engine.compress(&data, &CompressOptions::new(1)).unwrap();
        assert_eq!(engine.decompress(&frame).unwrap(), data);
    }

    #[test]
    fn detect_core_count_is_positive() {
        assert!(detect_core_count() >= 1);
    }
}
