//! Real-time playback through the output device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::bail;
use clap::Args;
use cricket_core::{Sample, SampleType};
use cricket_engine::{EngineConfig, GraphOutput, StreamUpdater};
use cricket_io::CpalOutput;

use super::common::{Session, SoundArgs, load_config, sample_type};

/// Interval between control-side updates while playing.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    sound: SoundArgs,

    /// Output device (exact or partial name)
    #[arg(short, long)]
    output: Option<String>,

    /// Mix in 8.24 fixed point
    #[arg(long, conflicts_with = "float")]
    fixed: bool,

    /// Mix in 32-bit float
    #[arg(long)]
    float: bool,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let config = load_config(args.sound.config.as_deref())?;
    match sample_type(&config, args.fixed, args.float) {
        SampleType::Fixed => play::<i32>(&args, &config),
        SampleType::Float => play::<f32>(&args, &config),
    }
}

fn play<T: Sample>(args: &PlayArgs, config: &EngineConfig) -> anyhow::Result<()> {
    println!("Loading {}...", args.sound.file.display());
    let updater = StreamUpdater::spawn(Duration::from_secs_f32(
        config.stream_file_update_ms.max(1.0) / 1000.0,
    ));
    let mut session = Session::<T>::open(&args.sound, config, &updater)?;
    if session.has_filter() {
        println!("  Filtering through an effect bus");
    }

    // Settings reach the source before the file thread first reads a stream.
    session.graph.update();

    let mut output = CpalOutput::new(&session.graph);
    if let Some(device) = &args.output {
        output = output.with_device(device.clone());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    output.start()?;
    session.sound.play();
    println!(
        "\nPlaying at {} Hz ({:?})... Press Ctrl+C to stop.\n",
        session.graph.sample_rate(),
        T::TYPE
    );

    let mut reported_length = false;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(POLL_INTERVAL);
        session.sound.update();

        if session.sound.is_failed() {
            output.stop();
            bail!("{} could not be opened", args.sound.file.display());
        }
        if !reported_length && let Some(ms) = session.sound.length_ms() {
            reported_length = true;
            println!(
                "  {} ch, {} Hz, {:.1}s",
                session.sound.channels().unwrap_or(0),
                session.sound.sample_rate().unwrap_or(0),
                ms / 1000.0
            );
        }
        if session.sound.is_ready() && !session.sound.is_playing() {
            break;
        }
        if session.graph.clipped() {
            tracing::debug!("output clipped");
            session.graph.reset_clip();
        }
    }

    session.sound.stop();
    output.stop();
    tracing::debug!(
        load = session.graph.render_load(),
        banks = session.bank_count(),
        "playback finished"
    );
    println!("Done.");
    Ok(())
}
