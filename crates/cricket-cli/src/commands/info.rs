//! Display bank, stream and WAV file metadata.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use cricket_engine::format::{ByteReader, FileHeader, HEADER_BYTES};
use cricket_engine::stream_file::AudioStream;
use cricket_engine::{BankData, CksFileStream, FileType, SampleInfo};
use cricket_io::{WavFormat, read_wav_info};
use serde::Serialize;

use super::common::{FileKind, detect};

/// Display file information.
#[derive(Args)]
pub struct InfoArgs {
    /// Bank (.ckb), stream (.cks) or WAV file
    pub file: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct HeaderReport {
    version: u32,
    targets: u32,
}

#[derive(Serialize)]
struct SampleReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    format: &'static str,
    channels: u8,
    sample_rate: u16,
    frames: usize,
    length_ms: f32,
    data_bytes: usize,
    volume: f32,
    pan: f32,
    loop_start: u32,
    loop_end: i32,
    loop_count: i16,
}

impl SampleReport {
    fn new(name: Option<String>, info: &SampleInfo) -> Self {
        Self {
            name,
            format: info.format.name(),
            channels: info.channels,
            sample_rate: info.sample_rate,
            frames: info.frames(),
            length_ms: info.length_ms(),
            data_bytes: info.data_bytes(),
            volume: info.volume_gain(),
            pan: info.pan_position(),
            loop_start: info.loop_start,
            loop_end: info.loop_end,
            loop_count: info.loop_count,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FileReport {
    Bank {
        header: HeaderReport,
        name: String,
        samples: Vec<SampleReport>,
    },
    Stream {
        header: HeaderReport,
        sample: SampleReport,
    },
    Wav {
        format: &'static str,
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        frames: u64,
        duration_secs: f64,
    },
}

fn read_header(path: &Path, expected: FileType) -> anyhow::Result<HeaderReport> {
    let mut head = [0u8; HEADER_BYTES];
    File::open(path)?
        .read_exact(&mut head)
        .context("file is shorter than its header")?;
    let header = FileHeader::parse(&mut ByteReader::new(&head), expected)?;
    Ok(HeaderReport {
        version: header.version,
        targets: header.targets,
    })
}

fn report(path: &Path) -> anyhow::Result<FileReport> {
    Ok(match detect(path)? {
        FileKind::Bank => {
            let header = read_header(path, FileType::Bank)?;
            let data = BankData::parse(std::fs::read(path)?)
                .with_context(|| format!("cannot parse bank {}", path.display()))?;
            FileReport::Bank {
                header,
                name: data.name().to_string(),
                samples: data
                    .samples()
                    .iter()
                    .map(|s| SampleReport::new(Some(s.name.clone()), &s.info))
                    .collect(),
            }
        }
        FileKind::Stream => {
            let header = read_header(path, FileType::Stream)?;
            let info = CksFileStream::new(path)
                .init()
                .with_context(|| format!("cannot open stream {}", path.display()))?;
            FileReport::Stream {
                header,
                sample: SampleReport::new(None, &info),
            }
        }
        FileKind::Wav => {
            let info = read_wav_info(path)?;
            FileReport::Wav {
                format: match info.format {
                    WavFormat::Pcm => "PCM",
                    WavFormat::IeeeFloat => "IEEE Float",
                },
                channels: info.channels,
                sample_rate: info.sample_rate,
                bits_per_sample: info.bits_per_sample,
                frames: info.num_frames,
                duration_secs: info.duration_secs,
            }
        }
    })
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let report = report(&args.file)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let file_size = std::fs::metadata(&args.file)?.len();
    println!("File:        {}", args.file.display());
    println!("File Size:   {}", format_bytes(file_size));

    match report {
        FileReport::Bank {
            header,
            name,
            samples,
        } => {
            println!("Type:        bank (version {})", header.version);
            println!("Targets:     {:#08b}", header.targets);
            println!("Name:        {}", name);
            println!("Sounds:      {}\n", samples.len());
            println!(
                "  {:>3}  {:<24} {:<6} {:>2} {:>6} {:>9} {:>10}  {}",
                "#", "name", "format", "ch", "rate", "frames", "length", "loop"
            );
            for (i, s) in samples.iter().enumerate() {
                println!(
                    "  {:>3}  {:<24} {:<6} {:>2} {:>6} {:>9} {:>8.1}ms  {}",
                    i,
                    s.name.as_deref().unwrap_or(""),
                    s.format,
                    s.channels,
                    s.sample_rate,
                    s.frames,
                    s.length_ms,
                    describe_loop(s)
                );
            }
        }
        FileReport::Stream { header, sample } => {
            println!("Type:        stream (version {})", header.version);
            println!("Targets:     {:#08b}", header.targets);
            println!("Format:      {}", sample.format);
            println!("Channels:    {}", sample.channels);
            println!("Sample Rate: {} Hz", sample.sample_rate);
            println!(
                "Duration:    {:.3}s ({} frames)",
                sample.length_ms / 1000.0,
                sample.frames
            );
            println!("Volume:      {:.2}", sample.volume);
            println!("Pan:         {:+.2}", sample.pan);
            println!("Loop:        {}", describe_loop(&sample));
        }
        FileReport::Wav {
            format,
            channels,
            sample_rate,
            bits_per_sample,
            frames,
            duration_secs,
        } => {
            println!("Type:        WAV");
            println!("Format:      {} {}-bit", format, bits_per_sample);
            println!("Channels:    {}", channels);
            println!("Sample Rate: {} Hz", sample_rate);
            println!("Duration:    {:.3}s ({} frames)", duration_secs, frames);
        }
    }

    Ok(())
}

fn describe_loop(s: &SampleReport) -> String {
    if s.loop_count == 0 {
        return "none".to_string();
    }
    let end = if s.loop_end < 0 {
        "end".to_string()
    } else {
        s.loop_end.to_string()
    };
    let count = if s.loop_count < 0 {
        "forever".to_string()
    } else {
        format!("x{}", s.loop_count)
    };
    format!("[{}, {}) {}", s.loop_start, end, count)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
