use clap::{Parser, Subcommand};
use shufpack::codec::CodecId;
use shufpack::engine::{CompressOptions, Engine};
use shufpack::frame::{self, HEADER_SIZE, SEGMENT_ENTRY_SIZE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shufpack", about = "Blocked shuffle-and-compress engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a .spk frame
    Compress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Element width in bytes (aligns the shuffle filter)
        #[arg(short, long, default_value = "1")]
        typesize: usize,
        /// Compression level 0 (store) to 9 (maximum)
        #[arg(short, long, default_value = "5")]
        level: u32,
        /// Codec: lz4 (default), zstd, brotli, lzma, memcpy
        #[arg(short, long, default_value = "lz4")]
        codec: String,
        /// Disable the byte-shuffle pre-filter
        #[arg(long)]
        no_shuffle: bool,
        /// Worker threads (default: one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
    /// Decompress a .spk frame
    Decompress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
    /// Show frame metadata
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {
        // ── Compress ─────────────────────────────────────────────────────────
        Commands::Compress {
            input,
            output,
            typesize,
            level,
            codec,
            no_shuffle,
            threads,
        } => {
            let codec_id = CodecId::from_name(&codec)
                .ok_or_else(|| format!("unknown codec: {codec}"))?;
            let engine = make_engine(threads)?;
            let data = std::fs::read(&input)?;
            let opts = CompressOptions::new(typesize)
                .level(level)
                .shuffle(!no_shuffle)
                .codec(codec_id);
            let frame = engine.compress(&data, &opts)?;
            std::fs::write(&output, &frame)?;
            println!(
                "{} -> {} ({} -> {} bytes, ratio {:.2})",
                input.display(),
                output.display(),
                data.len(),
                frame.len(),
                data.len() as f64 / frame.len().max(1) as f64,
            );
        }

        // ── Decompress ───────────────────────────────────────────────────────
        Commands::Decompress {
            input,
            output,
            threads,
        } => {
            let engine = make_engine(threads)?;
            let frame = std::fs::read(&input)?;
            let data = engine.decompress(&frame)?;
            std::fs::write(&output, &data)?;
            println!(
                "{} -> {} ({} -> {} bytes)",
                input.display(),
                output.display(),
                frame.len(),
                data.len(),
            );
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let bytes = std::fs::read(&input)?;
            let parsed = frame::parse(&bytes)?;
            let h = parsed.header;
            let raw_count = parsed.entries.iter().filter(|e| e.raw).count();
            let overhead = HEADER_SIZE + parsed.entries.len() * SEGMENT_ENTRY_SIZE;

            println!("Frame:          {}", input.display());
            println!("Codec:          {}", h.codec.name());
            println!("Typesize:       {}", h.typesize);
            println!("Shuffle:        {}", h.shuffle);
            println!("Original size:  {} bytes", h.original_len);
            println!("Frame size:     {} bytes ({} overhead)", bytes.len(), overhead);
            println!("Blocks:         {} x {} bytes ({} stored raw)",
                h.block_count, h.block_size, raw_count);
            println!(
                "Ratio:          {:.2}",
                h.original_len as f64 / bytes.len() as f64
            );
        }
    }

    Ok(())
}

fn make_engine(threads: Option<usize>) -> Result<Engine, shufpack::Error> {
    match threads {
        Some(n) => Engine::with_threads(n),
        None => Ok(Engine::new()),
    }
}
