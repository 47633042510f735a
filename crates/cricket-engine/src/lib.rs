//! Cricket Engine - real-time mixing graph
//!
//! Plays sounds from sample banks (`.ckb`), streamed files (`.cks`) and
//! generated tones through a tree of mixes and effect buses, producing
//! interleaved stereo frames for an output device or a capture file.
//!
//! # Threads
//!
//! - **Control threads** own the handles ([`Sound`], [`EffectBus`],
//!   [`Effect`], [`Mixer`]) and queue [`Command`]s through the shared
//!   [`AudioGraph`]. They never touch nodes directly.
//! - **The audio thread** calls [`RenderHandle::render`]. It drains the
//!   command queue, renders the graph and hands replaced values back through
//!   a disposal channel, so it never frees memory itself.
//! - **The file thread** ([`StreamUpdater`]) refills stream ring buffers;
//!   the [`AsyncLoader`] thread reads banks in the background.
//!
//! # Graph
//!
//! ```text
//! sources ──► effect buses ──► master mix ──► global bus ──► output
//! ```
//!
//! # Example
//!
//! ```rust
//! use cricket_engine::{AudioGraph, EngineConfig, ManualOutput, Sound};
//!
//! let graph = AudioGraph::<f32>::new(&EngineConfig::default());
//! let mut tone = Sound::sine(&graph, 440.0);
//! tone.set_volume(0.5);
//! tone.play();
//!
//! let mut out = ManualOutput::new(&graph);
//! assert_eq!(out.render(256).len(), 512);
//! assert!(tone.is_playing());
//! ```

pub mod arena;
pub mod bank;
pub mod bus;
pub mod command;
pub mod decoder;
pub mod effect;
pub mod error;
pub mod format;
pub mod graph;
pub mod loader;
pub mod mixer;
pub mod node;
pub mod output;
pub mod registry;
pub mod sound;
pub mod source;
pub mod stream_file;
pub mod writer;

mod pool;
mod queue;
mod ring;
mod throttle;

pub use arena::{EffectId, NodeId};
pub use bank::{Bank, BankData, BankWriter, SampleEntry};
pub use bus::EffectBus;
pub use command::Command;
pub use cricket_config::EngineConfig;
pub use decoder::Decoder;
pub use effect::Effect;
pub use error::{Error, Result};
pub use format::{AudioFormat, FileType, SampleInfo};
pub use graph::{AudioGraph, GraphStats, RenderHandle};
pub use loader::AsyncLoader;
pub use mixer::Mixer;
pub use output::{GraphOutput, ManualOutput};
pub use registry::{BankId, BankRegistry};
pub use sound::Sound;
pub use source::{AudioSource, BufferSource, SineSource, StreamSource, StreamUpdater};
pub use stream_file::{AudioStream, CksFileStream, MemoryStream, stream_bytes, write_stream};
pub use writer::{AudioWriter, RawWriter};
