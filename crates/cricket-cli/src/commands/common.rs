//! Shared CLI helpers used across multiple commands.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use cricket_core::{Sample, SampleType};
use cricket_effects::{BiquadFilter, BiquadType, EffectKind, EffectRegistry};
use cricket_engine::format::{ByteReader, FileHeader, HEADER_BYTES};
use cricket_engine::{
    AudioFormat, AudioGraph, BankRegistry, Effect, EffectBus, EngineConfig, FileType, Sound,
    StreamUpdater,
};

/// Kind of file given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.ckb` sample bank.
    Bank,
    /// `.cks` stream.
    Stream,
    /// WAV file, imported into memory.
    Wav,
}

/// Identifies a file by its header, falling back to the `.wav` extension.
pub fn detect(path: &Path) -> anyhow::Result<FileKind> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut head = [0u8; HEADER_BYTES];
    let read = file.read(&mut head)?;
    if read >= 4 && &head[..4] == b"RIFF" {
        return Ok(FileKind::Wav);
    }
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        return Ok(FileKind::Wav);
    }

    match FileHeader::parse(&mut ByteReader::new(&head[..read]), FileType::Bank) {
        Ok(_) => Ok(FileKind::Bank),
        Err(cricket_engine::Error::WrongFileType { found, .. })
            if found == FileType::Stream as u32 =>
        {
            Ok(FileKind::Stream)
        }
        Err(e) => Err(e).with_context(|| format!("{} is not a cricket file", path.display())),
    }
}

/// Filter applied through an effect bus, parsed from `TYPE:FREQ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    /// Biquad response.
    pub kind: BiquadType,
    /// Cutoff or center frequency in Hz.
    pub freq: f32,
}

/// Parse a `type:freq` string for clap's `value_parser`.
pub fn parse_filter(s: &str) -> Result<FilterSpec, String> {
    let (kind, freq) = s
        .split_once(':')
        .ok_or_else(|| format!("Invalid filter '{}' (expected TYPE:FREQ)", s))?;
    let kind = BiquadType::from_name(&kind.to_lowercase()).ok_or_else(|| {
        let names: Vec<_> = BiquadType::ALL.iter().map(|t| t.name()).collect();
        format!("Unknown filter type '{}' (one of {})", kind, names.join(", "))
    })?;
    let freq: f32 = freq
        .parse()
        .map_err(|_| format!("Invalid filter frequency '{}'", freq))?;
    if freq.is_nan() || freq <= 0.0 {
        return Err(format!("Filter frequency must be positive, got {}", freq));
    }
    Ok(FilterSpec { kind, freq })
}

/// Parse an engine sample format name for clap's `value_parser`.
pub fn parse_format(s: &str) -> Result<AudioFormat, String> {
    AudioFormat::from_name(s).ok_or_else(|| {
        let names: Vec<_> = AudioFormat::ALL.iter().map(|f| f.name()).collect();
        format!("Unknown format '{}' (one of {})", s, names.join(", "))
    })
}

/// Sound selection and playback settings shared by `play` and `render`.
#[derive(Args, Debug, Clone)]
pub struct SoundArgs {
    /// Bank (.ckb), stream (.cks) or WAV file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Sound name inside a bank (defaults to the first sound)
    #[arg(short, long)]
    pub sound: Option<String>,

    /// Playback speed (1.0 = original pitch)
    #[arg(long)]
    pub speed: Option<f32>,

    /// Stereo pan from -1.0 (left) to 1.0 (right)
    #[arg(long, allow_negative_numbers = true)]
    pub pan: Option<f32>,

    /// Volume (1.0 = unity)
    #[arg(long)]
    pub volume: Option<f32>,

    /// Number of times to repeat the loop region (-1 = forever)
    #[arg(long = "loop", value_name = "N", allow_negative_numbers = true)]
    pub loop_count: Option<i32>,

    /// Biquad filter on an effect bus, e.g. "lowpass:800"
    #[arg(long, value_name = "TYPE:FREQ", value_parser = parse_filter)]
    pub filter: Option<FilterSpec>,

    /// Sample format used when importing WAV files
    #[arg(long, default_value = "pcm16", value_parser = parse_format)]
    pub wav_format: AudioFormat,

    /// Engine configuration file (defaults to the user config)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Loads the engine configuration named by `--config`, or the user default.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    cricket_config::load_or_default(path).context("cannot load engine configuration")
}

/// Resolves the sample representation from the flags or the configuration.
pub fn sample_type(config: &EngineConfig, fixed: bool, float: bool) -> SampleType {
    if fixed {
        SampleType::Fixed
    } else if float {
        SampleType::Float
    } else {
        config.resolved_sample_type()
    }
}

/// One sound in its own graph, with everything it depends on.
///
/// Fields drop in order: the sound goes before its bus and bank.
pub struct Session<T: Sample> {
    /// The sound being played.
    pub sound: Sound<T>,
    filter: Option<(EffectBus<T>, Effect<T>)>,
    banks: BankRegistry,
    /// Graph the sound plays in.
    pub graph: Arc<AudioGraph<T>>,
}

impl<T: Sample> Session<T> {
    /// Builds the graph and the sound described by `args`.
    ///
    /// Streams register with `updater`, which the caller drives.
    pub fn open(args: &SoundArgs, config: &EngineConfig, updater: &StreamUpdater) -> anyhow::Result<Self> {
        let graph = AudioGraph::<T>::new(config);
        let mut banks = BankRegistry::new();
        let path = &args.file;

        let mut sound = match detect(path)? {
            FileKind::Bank => {
                let id = banks
                    .load(path, 0, 0)
                    .with_context(|| format!("cannot load bank {}", path.display()))?;
                let bank = Arc::clone(banks.get(id).context("bank was not registered")?);
                match &args.sound {
                    Some(name) => Sound::from_bank_name(&graph, &bank, name)
                        .with_context(|| format!("no sound named '{}' in {}", name, path.display()))?,
                    None => Sound::from_bank(&graph, &bank, 0).context("bank contains no sounds")?,
                }
            }
            FileKind::Stream => {
                if args.sound.is_some() {
                    tracing::warn!("--sound is ignored for stream files");
                }
                Sound::from_stream_file(&graph, updater, path, 0, 0)
                    .with_context(|| format!("cannot stream {}", path.display()))?
            }
            FileKind::Wav => cricket_io::wav_sound(&graph, path, args.wav_format)
                .with_context(|| format!("cannot import {}", path.display()))?,
        };

        if let Some(volume) = args.volume {
            sound.set_volume(volume);
        }
        if let Some(pan) = args.pan {
            sound.set_pan(pan);
        }
        if let Some(speed) = args.speed {
            sound.set_speed(speed);
        }
        if let Some(count) = args.loop_count {
            sound.set_loop_count(count);
        }

        let filter = args.filter.map(|spec| {
            let registry = EffectRegistry::new();
            let mut effect = Effect::new(&graph, &registry, EffectKind::BiquadFilter);
            effect.set_param(BiquadFilter::PARAM_TYPE, f32::from(spec.kind as u8));
            effect.set_param(BiquadFilter::PARAM_FREQ, spec.freq);
            let mut bus = EffectBus::new(&graph);
            bus.add_effect(&effect);
            sound.set_effect_bus(Some(&bus));
            tracing::info!(kind = spec.kind.name(), freq = spec.freq, "filter enabled");
            (bus, effect)
        });

        Ok(Self {
            sound,
            filter,
            banks,
            graph,
        })
    }

    /// Whether a filter bus is attached.
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Number of banks loaded for this session.
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }
}
