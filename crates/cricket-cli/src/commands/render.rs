//! Offline rendering to a WAV file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::bail;
use clap::Args;
use cricket_core::{Sample, SampleType};
use cricket_engine::{EngineConfig, ManualOutput, StreamUpdater};
use cricket_io::{WavWriter, read_wav_info};
use indicatif::{ProgressBar, ProgressStyle};

use super::common::{Session, SoundArgs, load_config, sample_type};

/// Longest render when neither `--seconds` nor the sound bounds it.
const MAX_SECONDS: f32 = 600.0;

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    sound: SoundArgs,

    /// Output WAV file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Length to render (default: until the sound finishes)
    #[arg(long)]
    seconds: Option<f32>,

    /// Mix in 8.24 fixed point
    #[arg(long, conflicts_with = "float")]
    fixed: bool,

    /// Mix in 32-bit float
    #[arg(long)]
    float: bool,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if let Some(seconds) = args.seconds
        && (seconds.is_nan() || seconds <= 0.0)
    {
        bail!("--seconds must be positive, got {}", seconds);
    }
    let config = load_config(args.sound.config.as_deref())?;
    match sample_type(&config, args.fixed, args.float) {
        SampleType::Fixed => render::<i32>(&args, &config),
        SampleType::Float => render::<f32>(&args, &config),
    }
}

fn render<T: Sample>(args: &RenderArgs, config: &EngineConfig) -> anyhow::Result<()> {
    let updater = StreamUpdater::manual();
    let mut session = Session::<T>::open(&args.sound, config, &updater)?;
    let graph = std::sync::Arc::clone(&session.graph);
    let sample_rate = graph.sample_rate();
    let quantum = config.frames_per_update().max(1);
    let seconds = args.seconds.unwrap_or(MAX_SECONDS);
    let limit = (seconds * sample_rate as f32) as usize;

    println!(
        "Rendering {} -> {} ({} Hz, {:?})",
        args.sound.file.display(),
        args.output.display(),
        sample_rate,
        T::TYPE
    );

    let pb = if args.seconds.is_some() {
        let pb = ProgressBar::new(limit as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {pos} frames")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };

    let mut out = ManualOutput::new(&graph);
    graph.start_capture(WavWriter::create(&args.output, sample_rate)?);
    // Settings reach the source before the first stream read.
    graph.update();
    session.sound.play();

    let started = Instant::now();
    let mut rendered = 0usize;
    while rendered < limit {
        updater.update_all();
        session.sound.update();
        if session.sound.is_failed() {
            pb.abandon();
            bail!("{} could not be opened", args.sound.file.display());
        }
        if args.seconds.is_none() && session.sound.is_ready() && !session.sound.is_playing() {
            break;
        }
        let n = quantum.min(limit - rendered);
        out.render(n);
        rendered += n;
        pb.inc(n as u64);
    }
    if args.seconds.is_none() && rendered >= limit {
        tracing::warn!(seconds = MAX_SECONDS, "sound still playing; render cut off");
    }

    // The writer comes back through the graph and finalizes on drop.
    graph.stop_capture();
    out.render(quantum);
    graph.update();
    pb.finish_and_clear();

    let clipped = graph.clipped();
    drop(session);

    let info = read_wav_info(&args.output)?;
    println!(
        "Wrote {:.3}s ({} frames) in {:.2?}{}",
        info.duration_secs,
        info.num_frames,
        started.elapsed(),
        if clipped { "; output clipped" } else { "" }
    );
    Ok(())
}
