//! Integration tests for cricket-io.
//!
//! WAV files go in through the import helpers, play through a graph driven
//! by [`ManualOutput`], and come back out through [`WavWriter`] capture.

use std::path::Path;
use std::sync::Arc;

use cricket_core::{Sample, VolumeMatrix};
use cricket_engine::{
    AudioFormat, AudioGraph, EngineConfig, ManualOutput, Sound, StreamUpdater,
};
use cricket_io::{WavWriter, read_wav, wav_sound, wav_stream};

const QUANTUM: usize = 64;

fn graph<T: Sample>() -> Arc<AudioGraph<T>> {
    AudioGraph::new(&EngineConfig {
        sample_rate: 8000,
        audio_update_ms: 8.0,
        ..EngineConfig::default()
    })
}

/// Stereo 16-bit WAV: left counts up from 0, right counts down from 0.
fn write_counting_wav(path: &Path, frames: usize) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        w.write_sample(i as i16).unwrap();
        w.write_sample(-(i as i16)).unwrap();
    }
    w.finalize().unwrap();
}

fn render(out: &mut ManualOutput<f32>, quanta: usize) -> Vec<f32> {
    let mut all = Vec::new();
    for _ in 0..quanta {
        all.extend_from_slice(out.render(QUANTUM));
    }
    all
}

// ---------------------------------------------------------------------------
// WAV import
// ---------------------------------------------------------------------------

#[test]
fn imported_wav_plays_sample_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.wav");
    write_counting_wav(&path, 256);

    let graph = graph::<f32>();
    let mut sound = wav_sound(&graph, &path, AudioFormat::PcmI16).unwrap();
    assert_eq!(sound.length(), Some(256));
    assert_eq!(sound.channels(), Some(2));
    sound.set_pan_matrix(VolumeMatrix::IDENTITY);
    sound.play();

    let mut out = ManualOutput::new(&graph);
    let rendered = render(&mut out, 5);
    let expected: Vec<f32> = (0..256)
        .flat_map(|i| [f32::from_i16(i as i16), f32::from_i16(-(i as i16))])
        .collect();
    assert_eq!(&rendered[..512], &expected[..]);
    assert!(rendered[512..].iter().all(|&s| s == 0.0));

    sound.update();
    assert!(!sound.is_playing());
}

#[test]
fn wav_stream_plays_through_the_file_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.wav");
    write_counting_wav(&path, 300);

    let graph = graph::<f32>();
    let updater = StreamUpdater::manual();
    let stream = wav_stream(&path, AudioFormat::PcmI16).unwrap();
    let mut sound = Sound::from_stream(&graph, &updater, Box::new(stream));
    sound.set_pan_matrix(VolumeMatrix::IDENTITY);
    sound.play();

    let mut out = ManualOutput::new(&graph);
    let mut left = Vec::new();
    for _ in 0..20 {
        updater.update_all();
        sound.update();
        left.extend(out.render(QUANTUM).iter().step_by(2).copied());
    }
    assert!(!sound.is_failed());
    let first = left.iter().position(|&s| s != 0.0).unwrap();
    let expected: Vec<f32> = (1..300).map(|i| f32::from_i16(i as i16)).collect();
    assert_eq!(&left[first..first + 299], &expected[..]);
}

#[test]
fn rates_above_sixteen_bits_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hires.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 96000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(&path, spec).unwrap();
    w.write_sample(0i16).unwrap();
    w.finalize().unwrap();

    assert!(matches!(
        read_wav(&path, AudioFormat::PcmI16),
        Err(cricket_io::Error::UnsupportedFormat(_))
    ));
}

#[test]
fn float_wav_imports_as_pcm8() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut w = hound::WavWriter::create(&path, spec).unwrap();
    for v in [0.0f32, 0.5, -0.5, 1.0] {
        w.write_sample(v).unwrap();
    }
    w.finalize().unwrap();

    let (info, data) = read_wav(&path, AudioFormat::PcmI8).unwrap();
    assert_eq!(info.sample_rate, 22050);
    assert_eq!(info.frames(), 4);
    let bytes: Vec<i8> = data.iter().map(|&b| b as i8).collect();
    assert_eq!(bytes, vec![0, 63, -64, 127]);
}

// ---------------------------------------------------------------------------
// WAV capture
// ---------------------------------------------------------------------------

#[test]
fn capture_records_the_rendered_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.wav");
    let graph = graph::<f32>();
    let mut tone = Sound::sine(&graph, 440.0);
    tone.set_volume(0.5);
    tone.play();

    graph.start_capture(WavWriter::create(&path, graph.sample_rate()).unwrap());
    let mut out = ManualOutput::new(&graph);
    let rendered = render(&mut out, 4);
    graph.stop_capture();
    out.render(QUANTUM);
    graph.update();

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.duration() as usize, 4 * QUANTUM);
    let captured: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
    let expected: Vec<i16> = rendered.iter().map(|s| s.to_i16()).collect();
    assert_eq!(captured, expected);
}

#[test]
fn fixed_point_capture_matches_float_capture() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("count.wav");
    write_counting_wav(&wav, 200);

    let capture = |name: &str, fixed: bool| -> Vec<i16> {
        let path = dir.path().join(name);
        if fixed {
            let graph = graph::<i32>();
            let mut sound = wav_sound(&graph, &wav, AudioFormat::PcmI16).unwrap();
            sound.set_pan_matrix(VolumeMatrix::IDENTITY);
            sound.play();
            graph.start_capture(WavWriter::create(&path, 8000).unwrap());
            let mut out = ManualOutput::new(&graph);
            for _ in 0..4 {
                out.render(QUANTUM);
            }
            graph.stop_capture();
            out.render(QUANTUM);
            graph.update();
        } else {
            let graph = graph::<f32>();
            let mut sound = wav_sound(&graph, &wav, AudioFormat::PcmI16).unwrap();
            sound.set_pan_matrix(VolumeMatrix::IDENTITY);
            sound.play();
            graph.start_capture(WavWriter::create(&path, 8000).unwrap());
            let mut out = ManualOutput::new(&graph);
            render(&mut out, 4);
            graph.stop_capture();
            out.render(QUANTUM);
            graph.update();
        }
        hound::WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect()
    };

    let float = capture("float.wav", false);
    let fixed = capture("fixed.wav", true);
    assert_eq!(float.len(), fixed.len());
    for (a, b) in float.iter().zip(&fixed) {
        assert!((i32::from(*a) - i32::from(*b)).abs() <= 1, "{a} vs {b}");
    }
}
