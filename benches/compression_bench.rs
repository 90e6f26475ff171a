use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shufpack::codec::CodecId;
use shufpack::engine::{CompressOptions, Engine};

fn counter_buffer(elements: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(elements as usize * 4);
    for i in 0..elements {
        out.extend_from_slice(&i.to_le_bytes());
    }
    out
}

fn bench_codecs(c: &mut Criterion) {
    let engine = Engine::with_threads(1).unwrap();
    let data = counter_buffer(1_000_000);

    for codec in [CodecId::Lz4, CodecId::Zstd] {
        let opts = CompressOptions::new(4).level(5).codec(codec);
        c.bench_function(&*format!("compress_4mb_{}", codec.name()), |b| {
            b.iter(|| engine.compress(black_box(&data), &opts).unwrap())
        });
    }
}

fn bench_shuffle_effect(c: &mut Criterion) {
    let engine = Engine::with_threads(1).unwrap();
    let data = counter_buffer(1_000_000);

    for shuffle in [true, false] {
        let opts = CompressOptions::new(4).level(5).shuffle(shuffle);
        c.bench_function(&*format!("compress_4mb_shuffle_{shuffle}"), |b| {
            b.iter(|| engine.compress(black_box(&data), &opts).unwrap())
        });
    }
}

fn bench_thread_scaling(c: &mut Criterion) {
    let data = counter_buffer(4_000_000);
    let opts = CompressOptions::new(4).level(5);

    for threads in [1usize, 4, 8] {
        let engine = Engine::with_threads(threads).unwrap();
        c.bench_function(&*format!("compress_16mb_{threads}_threads"), |b| {
            b.iter(|| engine.compress(black_box(&data), &opts).unwrap())
        });
    }
}

fn bench_decompress(c: &mut Criterion) {
    let engine = Engine::with_threads(4).unwrap();
    let data = counter_buffer(1_000_000);
    let frame = engine
        .compress(&data, &CompressOptions::new(4).level(5))
        .unwrap();

    c.bench_function("decompress_4mb", |b| {
        b.iter(|| engine.decompress(black_box(&frame)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_codecs,
    bench_shuffle_effect,
    bench_thread_scaling,
    bench_decompress
);
criterion_main!(benches);
