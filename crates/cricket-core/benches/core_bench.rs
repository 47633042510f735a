//! Criterion benchmarks for cricket-core mixing primitives
//!
//! Run with: cargo bench -p cricket-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use cricket_core::{Sample, VolumeMatrix, adpcm, mix, mono_pan, stereo_pan, volume_rate};

const SAMPLE_RATE: f32 = 44100.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("Mix");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size * 2);
        let fixed: Vec<i32> = input.iter().map(|&s| i32::from_f32(s)).collect();

        group.bench_with_input(BenchmarkId::new("float", block_size), &block_size, |b, _| {
            let mut out = vec![0.0f32; block_size * 2];
            b.iter(|| mix::mix(black_box(&input), &mut out));
        });
        group.bench_with_input(BenchmarkId::new("fixed", block_size), &block_size, |b, _| {
            let mut out = vec![0i32; block_size * 2];
            b.iter(|| mix::mix(black_box(&fixed), &mut out));
        });
        group.bench_with_input(BenchmarkId::new("mix_vol", block_size), &block_size, |b, _| {
            let mut out = vec![0.0f32; block_size * 2];
            b.iter(|| mix::mix_vol(black_box(&input), 0.7, &mut out, 0.3));
        });
    }

    group.finish();
}

fn bench_pan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pan");
    let rate = volume_rate(40.0, SAMPLE_RATE);
    let mut target = VolumeMatrix::IDENTITY;
    target.set_stereo_pan(0.3);

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size * 2);

        group.bench_with_input(BenchmarkId::new("stereo_static", block_size), &block_size, |b, _| {
            let mut buf = input.clone();
            let mut vol = target;
            b.iter(|| stereo_pan(black_box(&mut buf), block_size, &target, &mut vol, rate));
        });
        group.bench_with_input(BenchmarkId::new("stereo_ramp", block_size), &block_size, |b, _| {
            let mut buf = input.clone();
            b.iter(|| {
                let mut vol = VolumeMatrix::IDENTITY;
                stereo_pan(black_box(&mut buf), block_size, &target, &mut vol, rate);
            });
        });
        group.bench_with_input(BenchmarkId::new("mono", block_size), &block_size, |b, _| {
            let mut out = vec![0.0f32; block_size * 2];
            let mut vol = VolumeMatrix::IDENTITY;
            let mut mono_target = VolumeMatrix::IDENTITY;
            mono_target.set_pan(-0.2);
            b.iter(|| mono_pan(black_box(&input[..block_size]), &mut out, block_size, &mono_target, &mut vol, rate));
        });
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resample");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size * 2);
        let fixed: Vec<i32> = input.iter().map(|&s| i32::from_f32(s)).collect();
        let out_frames = block_size * 3 / 4;

        group.bench_with_input(BenchmarkId::new("float_stereo", block_size), &block_size, |b, _| {
            let mut out = vec![0.0f32; out_frames * 2];
            let mut state = [0.0; 2];
            b.iter(|| f32::resample(&mut state, black_box(&input), block_size, &mut out, out_frames, 2));
        });
        group.bench_with_input(BenchmarkId::new("fixed_stereo", block_size), &block_size, |b, _| {
            let mut out = vec![0i32; out_frames * 2];
            let mut state = [0; 2];
            b.iter(|| i32::resample(&mut state, black_box(&fixed), block_size, &mut out, out_frames, 2));
        });
    }

    group.finish();
}

fn bench_adpcm(c: &mut Criterion) {
    let mut group = c.benchmark_group("ADPCM");
    let pcm: Vec<i16> = generate_test_signal(adpcm::FRAMES_PER_BLOCK * 64)
        .iter()
        .map(|&s| (s * 32767.0) as i16)
        .collect();
    let encoded = adpcm::encode(&pcm, 1);

    group.bench_function("encode_64_blocks", |b| {
        b.iter(|| black_box(adpcm::encode(black_box(&pcm), 1)));
    });
    group.bench_function("decode_64_blocks", |b| {
        b.iter(|| black_box(adpcm::decode(black_box(&encoded), 1)));
    });

    group.finish();
}

criterion_group!(benches, bench_mix, bench_pan, bench_resample, bench_adpcm);
criterion_main!(benches);
