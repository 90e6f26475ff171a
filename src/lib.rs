pub mod codec;
pub mod engine;
pub mod error;
pub mod frame;
pub mod pool;
pub mod shuffle;
pub mod split;

pub use codec::{get_codec, Codec, CodecId};
pub use engine::{
    compress, decompress, default_engine, detect_core_count, release_resources,
    set_thread_count, CompressOptions, Engine,
};
pub use error::{Error, Result};
pub use split::{MAX_BUFFER_SIZE, MAX_THREADS, MAX_TYPESIZE};
