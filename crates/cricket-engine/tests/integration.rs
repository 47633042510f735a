//! Integration tests for cricket-engine.
//!
//! Drives complete graphs through [`ManualOutput`]: banks and streams loaded
//! from disk, sounds routed through mixes and effect buses, and the captured
//! output checked sample by sample.

use std::sync::Arc;

use cricket_core::{Sample, VolumeMatrix};
use cricket_effects::{EffectKind, EffectRegistry};
use cricket_engine::bank::RECORD_BYTES;
use cricket_engine::format::NAME_BYTES;
use cricket_engine::{
    AudioFormat, AudioGraph, BankRegistry, BankWriter, Effect, EffectBus, EngineConfig, Error,
    ManualOutput, RawWriter, SampleInfo, Sound, StreamUpdater, write_stream,
};

/// Frames per render quantum with [`test_config`].
const QUANTUM: usize = 64;

fn test_config() -> EngineConfig {
    EngineConfig {
        sample_rate: 8000,
        audio_update_ms: 8.0,
        ..EngineConfig::default()
    }
}

fn graph() -> Arc<AudioGraph<f32>> {
    AudioGraph::new(&test_config())
}

/// Mono PCM16 where frame `i` holds `i`.
fn counting_pcm(frames: usize) -> Vec<u8> {
    (0..frames).flat_map(|i| (i as i16).to_le_bytes()).collect()
}

fn constant_pcm(frames: usize, value: i16) -> Vec<u8> {
    std::iter::repeat_n(value, frames).flat_map(i16::to_le_bytes).collect()
}

fn pcm16(frames: usize) -> SampleInfo {
    SampleInfo::new(AudioFormat::PcmI16, 1, 8000, frames)
}

/// Two-sample bank: 256 frames of silence and a 256-frame ramp.
fn test_bank() -> BankWriter {
    let mut writer = BankWriter::new("sfx");
    writer
        .add("silence", pcm16(256), constant_pcm(256, 0))
        .add("ramp", pcm16(256), counting_pcm(256));
    writer
}

/// Renders `quanta` quanta and returns the interleaved output.
fn render(out: &mut ManualOutput<f32>, quanta: usize) -> Vec<f32> {
    let mut all = Vec::with_capacity(quanta * QUANTUM * 2);
    for _ in 0..quanta {
        all.extend_from_slice(out.render(QUANTUM));
    }
    all
}

// ============================================================================
// 1. Banks
// ============================================================================

#[test]
fn bank_file_exposes_samples_by_name_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sfx.ckb");
    let bytes = test_bank().to_bytes();
    assert_eq!(&bytes[..4], b"ckmk");
    test_bank().write(&path).unwrap();

    let mut registry = BankRegistry::new();
    let id = registry.load(&path, 0, 0).unwrap();
    let bank = Arc::clone(registry.get(id).unwrap());
    assert!(bank.is_loaded() && !bank.is_failed());
    assert_eq!(bank.name(), Some("sfx"));
    assert_eq!(bank.num_sounds(), 2);
    assert_eq!(bank.sound_name(1), Some("ramp"));
    assert_eq!(bank.find_sound("ramp"), Some(1));
    assert_eq!(registry.find("sfx"), Some(id));

    let graph = graph();
    let by_name = Sound::from_registry(&graph, &registry, "ramp").unwrap();
    let by_index = Sound::from_bank(&graph, &bank, 1).unwrap();
    assert_eq!(by_name.length(), Some(256));
    assert_eq!(by_index.length(), by_name.length());
    assert_eq!(by_index.sample_rate(), Some(8000));
    assert!(Sound::from_bank(&graph, &bank, 2).is_none());
}

#[test]
fn corrupt_data_offset_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ckb");
    let mut bytes = test_bank().to_bytes();
    // offset field of the first record
    let at = 16 + NAME_BYTES + 4 + RECORD_BYTES - 4;
    bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut registry = BankRegistry::new();
    assert!(matches!(
        registry.load(&path, 0, 0),
        Err(Error::CorruptOffset { .. })
    ));
    assert!(registry.is_empty());

    let id = registry.load_async(&path, 0, 0).unwrap();
    let bank = Arc::clone(registry.get(id).unwrap());
    bank.wait();
    assert!(bank.is_failed());
    assert_eq!(bank.num_sounds(), 0);
    assert!(Sound::from_bank(&graph(), &bank, 0).is_none());
    assert!(registry.find_sample("ramp").is_none());
}

#[test]
fn destroying_a_bank_silences_its_sounds() {
    let graph = graph();
    let mut registry = BankRegistry::new();
    let id = registry.load_bytes(test_bank().to_bytes()).unwrap();
    let mut sound = Sound::from_registry(&graph, &registry, "ramp").unwrap();
    sound.set_loop_count(-1);
    sound.play();

    let mut out = ManualOutput::new(&graph);
    assert!(render(&mut out, 2).iter().any(|&s| s != 0.0));

    assert!(registry.destroy(id));
    assert!(sound.is_unloaded());
    assert!(!sound.is_playing());
    assert!(render(&mut out, 2).iter().all(|&s| s == 0.0));
}

// ============================================================================
// 2. Mixing
// ============================================================================

#[test]
fn silent_inputs_leave_the_signal_untouched() {
    let mut registry = BankRegistry::new();
    registry.load_bytes(test_bank().to_bytes()).unwrap();

    let mixed = graph();
    let mut sounds = Vec::new();
    for name in ["silence", "ramp", "silence"] {
        let mut sound = Sound::from_registry(&mixed, &registry, name).unwrap();
        sound.set_pan_matrix(VolumeMatrix::IDENTITY);
        sound.play();
        sounds.push(sound);
    }
    let mut out = ManualOutput::new(&mixed);
    let with_silence = render(&mut out, 4);

    let expected: Vec<f32> = (0..256)
        .flat_map(|i| {
            let s = f32::from_i16(i as i16);
            [s, s]
        })
        .collect();
    assert_eq!(with_silence, expected);

    let alone = graph();
    let mut ramp = Sound::from_registry(&alone, &registry, "ramp").unwrap();
    ramp.set_pan_matrix(VolumeMatrix::IDENTITY);
    ramp.play();
    let mut out = ManualOutput::new(&alone);
    assert_eq!(render(&mut out, 4), with_silence);
}

#[test]
fn mixer_pause_holds_position() {
    let mut registry = BankRegistry::new();
    registry.load_bytes(test_bank().to_bytes()).unwrap();
    let graph = graph();
    let sfx = graph.mixer().child("sfx");

    let mut sound = Sound::from_registry(&graph, &registry, "ramp").unwrap();
    sound.set_pan_matrix(VolumeMatrix::IDENTITY);
    sound.set_mixer(&sfx);
    sound.play();
    let mut out = ManualOutput::new(&graph);
    render(&mut out, 1);

    sfx.set_paused(true);
    sound.update();
    assert!(sound.is_mixed_paused());
    assert!(render(&mut out, 1).iter().all(|&s| s == 0.0));

    sfx.set_paused(false);
    sound.update();
    let resumed = render(&mut out, 1);
    assert_eq!(resumed[0], f32::from_i16(QUANTUM as i16));
}

#[test]
fn capture_receives_the_clamped_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.raw");
    let graph = graph();
    let mut tone = Sound::sine(&graph, 500.0);
    tone.play();

    graph.start_capture(RawWriter::create(&path).unwrap());
    let mut out = ManualOutput::new(&graph);
    let rendered = render(&mut out, 3);
    graph.stop_capture();
    out.render(QUANTUM);
    graph.update();

    let bytes = std::fs::read(&path).unwrap();
    let captured: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(captured, rendered);
}

// ============================================================================
// 3. Streams
// ============================================================================

#[test]
fn stream_loop_repeats_region_then_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("count.cks");
    write_stream(&path, &pcm16(2000), &counting_pcm(2000)).unwrap();

    let graph = graph();
    let updater = StreamUpdater::manual();
    let mut sound = Sound::from_stream_file(&graph, &updater, &path, 0, 0).unwrap();
    sound.set_pan_matrix(VolumeMatrix::IDENTITY);
    sound.set_loop(1000, 2000);
    sound.set_loop_count(2);
    // loop settings reach the stream before the file thread first reads it
    graph.update();
    updater.update_all();
    sound.update();
    assert!(sound.is_ready());
    sound.play();
    assert!(sound.is_playing());

    let mut out = ManualOutput::new(&graph);
    let mut left = Vec::new();
    for _ in 0..200 {
        if !sound.is_playing() {
            break;
        }
        updater.update_all();
        left.extend(out.render(QUANTUM).iter().step_by(2).copied());
        sound.update();
    }
    assert!(!sound.is_playing());

    let expected: Vec<f32> = (0..2000)
        .chain(1000..2000)
        .chain(1000..2000)
        .map(|i| f32::from_i16(i as i16))
        .collect();
    assert!(left.len() >= expected.len());
    assert_eq!(&left[..expected.len()], &expected[..]);
    assert!(left[expected.len()..].iter().all(|&s| s == 0.0));
}

#[test]
fn stream_range_outside_the_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.cks");
    write_stream(&path, &pcm16(10), &counting_pcm(10)).unwrap();

    let graph = graph();
    let updater = StreamUpdater::manual();
    let size = std::fs::metadata(&path).unwrap().len() as i64;
    assert!(matches!(
        Sound::from_stream_file(&graph, &updater, &path, size, 0),
        Err(Error::InvalidRange { .. })
    ));
    assert!(Sound::from_stream_file(&graph, &updater, dir.path().join("none.cks"), 0, 0).is_err());
}

// ============================================================================
// 4. Effect buses
// ============================================================================

/// Renders a sine through a distortion bus configured by `setup`.
fn render_through_bus(setup: impl FnOnce(&mut EffectBus<f32>, &mut Effect<f32>)) -> Vec<f32> {
    let graph = graph();
    let registry = EffectRegistry::new();
    let mut fx = Effect::new(&graph, &registry, EffectKind::Distortion);
    let mut bus = EffectBus::new(&graph);
    bus.add_effect(&fx);
    setup(&mut bus, &mut fx);

    let mut tone = Sound::sine(&graph, 300.0);
    tone.set_effect_bus(Some(&bus));
    tone.play();
    let mut out = ManualOutput::new(&graph);
    render(&mut out, 8)
}

#[test]
fn fully_dry_bus_matches_bypass_exactly() {
    let dry = render_through_bus(|bus, _| bus.set_wet_dry_ratio(0.0));
    let bypassed = render_through_bus(|bus, _| bus.set_bypassed(true));
    assert!(dry.iter().any(|&s| s != 0.0));
    assert_eq!(dry, bypassed);
}

#[test]
fn bus_with_every_effect_bypassed_passes_through() {
    let half_wet = render_through_bus(|bus, fx| {
        bus.set_wet_dry_ratio(0.5);
        fx.set_bypassed(true);
    });
    let bypassed = render_through_bus(|bus, _| bus.set_bypassed(true));
    assert!(bypassed.iter().any(|&s| s != 0.0));
    assert_eq!(half_wet, bypassed);
}

#[test]
fn removed_bus_reroutes_its_sounds_to_master() {
    let graph = graph();
    let mut bus = EffectBus::new(&graph);
    bus.set_bypassed(true);
    let mut tone = Sound::sine(&graph, 300.0);
    tone.set_effect_bus(Some(&bus));
    tone.play();

    let mut out = ManualOutput::new(&graph);
    let before = render(&mut out, 1);
    assert!(before.iter().any(|&s| s != 0.0));

    drop(bus);
    assert_eq!(tone.effect_bus(), None);
    assert!(render(&mut out, 1).iter().any(|&s| s != 0.0));
}
