//! Playable sounds.
//!
//! A [`Sound`] owns one source node in the graph and mirrors its settings on
//! the control side. Setters send commands; playback state comes back
//! through the node's [`SourceStatus`] atomics. Call [`Sound::update`]
//! regularly: it finishes stream initialization, starts a deferred play and
//! picks up mixer volume and pause changes.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cricket_core::{Sample, VolumeMatrix};

use crate::arena::NodeId;
use crate::bank::Bank;
use crate::bus::EffectBus;
use crate::command::Command;
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::format::SampleInfo;
use crate::graph::AudioGraph;
use crate::mixer::Mixer;
use crate::node::{Node, SourceCommand, SourceNode, SourceStatus};
use crate::registry::BankRegistry;
use crate::source::{AudioSource, BufferSource, SineSource, StreamSource, StreamUpdater};
use crate::stream_file::{AudioStream, CksFileStream, resolve_range};

/// State shared between a sound and the bank it was built from.
#[derive(Debug, Default)]
pub(crate) struct SoundShared {
    unloaded: AtomicBool,
}

impl SoundShared {
    fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }
}

/// Where a sound's data comes from.
enum Origin {
    /// Bank sample or generated tone: format known up front.
    Memory(SampleInfo),
    /// Streamed file: format known once the file thread opens it.
    Stream(Arc<StreamSource>),
}

impl Origin {
    fn sample_info(&self) -> Option<SampleInfo> {
        match self {
            Origin::Memory(info) => Some(*info),
            Origin::Stream(stream) => stream.sample_info().filter(|_| stream.is_inited()),
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            Origin::Memory(_) => true,
            Origin::Stream(stream) => stream.is_ready(),
        }
    }

    fn is_failed(&self) -> bool {
        match self {
            Origin::Memory(_) => false,
            Origin::Stream(stream) => stream.is_failed(),
        }
    }
}

/// Control-thread handle to a playing (or playable) sound.
pub struct Sound<T: Sample> {
    graph: Arc<AudioGraph<T>>,
    node: NodeId,
    status: Arc<SourceStatus>,
    shared: Arc<SoundShared>,
    origin: Origin,
    info: Option<SampleInfo>,
    mixer: Mixer,
    bus: Option<NodeId>,
    next: Option<NodeId>,

    volume: f32,
    volume_set: bool,
    pan: f32,
    pan_set: bool,
    pan_matrix: Option<VolumeMatrix>,
    speed: f32,
    paused: bool,

    sent_volume: Option<VolumeMatrix>,
    sent_speed: f32,
    sent_paused: bool,

    loop_start: i32,
    loop_end: i32,
    loop_count: i32,
    loop_set: bool,
    loop_count_set: bool,
    loop_released: bool,

    play_id: i32,
    playing: bool,
    play_when_ready: bool,
}

impl<T: Sample> Sound<T> {
    /// Sound playing sample `index` of a loaded bank.
    ///
    /// Returns `None` (with an error logged) if the bank is not loaded or
    /// the index is out of range. Unloading the bank stops the sound.
    pub fn from_bank(graph: &Arc<AudioGraph<T>>, bank: &Arc<Bank>, index: usize) -> Option<Self> {
        let Some(data) = bank.data() else {
            tracing::error!(?bank, "cannot create a sound from a bank that is not loaded");
            return None;
        };
        let (Some(entry), Some(source)) = (data.sample(index), data.source(index)) else {
            tracing::error!(index, bank = data.name(), sounds = data.len(), "sound index out of range");
            return None;
        };
        let sound = Self::build(graph, Box::new(source), Origin::Memory(entry.info));

        let graph = Arc::downgrade(&sound.graph);
        let shared = Arc::downgrade(&sound.shared);
        let node = sound.node;
        bank.on_unload(Box::new(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            shared.unloaded.store(true, Ordering::Release);
            if let Some(graph) = graph.upgrade() {
                graph.execute(Command::Source(node, SourceCommand::SetPlaying(0)));
            }
        }));
        Some(sound)
    }

    /// Sound playing the sample named `name` in a loaded bank.
    pub fn from_bank_name(graph: &Arc<AudioGraph<T>>, bank: &Arc<Bank>, name: &str) -> Option<Self> {
        match bank.find_sound(name) {
            Some(index) => Self::from_bank(graph, bank, index),
            None => {
                tracing::error!(name, "could not find sample");
                None
            }
        }
    }

    /// Sound playing the first sample named `name` in any loaded bank of
    /// `registry`.
    pub fn from_registry(graph: &Arc<AudioGraph<T>>, registry: &BankRegistry, name: &str) -> Option<Self> {
        match registry.find_sample(name) {
            Some((bank, index)) => Self::from_bank(graph, &bank, index),
            None => {
                tracing::error!(name, "could not find sample in any loaded bank");
                None
            }
        }
    }

    /// Sound streaming a `.cks` file, or a stream embedded at `offset` in a
    /// larger file (`length <= 0` reads to the end).
    ///
    /// The range is checked right away; the file itself is opened on the
    /// updater's thread.
    pub fn from_stream_file(
        graph: &Arc<AudioGraph<T>>,
        updater: &StreamUpdater,
        path: impl AsRef<Path>,
        offset: i64,
        length: i64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        resolve_range(offset, length, size)?;
        let stream = CksFileStream::with_range(path, offset, length);
        Ok(Self::from_stream(graph, updater, Box::new(stream)))
    }

    /// Sound streaming from any [`AudioStream`].
    pub fn from_stream(graph: &Arc<AudioGraph<T>>, updater: &StreamUpdater, stream: Box<dyn AudioStream>) -> Self {
        let stream = StreamSource::new(stream, graph.config().stream_buffer_ms);
        updater.register(&stream);
        Self::build(graph, Box::new(stream.reader()), Origin::Stream(stream))
    }

    /// Sound playing encoded sample data held in memory.
    pub fn from_memory(graph: &Arc<AudioGraph<T>>, info: SampleInfo, data: Vec<u8>) -> Result<Self> {
        info.validate()?;
        if data.len() != info.data_bytes() {
            return Err(Error::InvalidSampleInfo(format!(
                "{} data bytes (expecting {})",
                data.len(),
                info.data_bytes()
            )));
        }
        let source = BufferSource::from_bytes(data, info);
        Ok(Self::build(graph, Box::new(source), Origin::Memory(info)))
    }

    /// Endless mono sine tone at roughly `freq_hz`.
    pub fn sine(graph: &Arc<AudioGraph<T>>, freq_hz: f32) -> Self {
        let rate = u16::try_from(graph.sample_rate()).unwrap_or(u16::MAX);
        let source = SineSource::new(1, rate, freq_hz);
        match source.sample_info() {
            Some(info) => Self::build(graph, Box::new(source), Origin::Memory(info)),
            None => unreachable!("generated tones always know their format"),
        }
    }

    fn build(graph: &Arc<AudioGraph<T>>, source: Box<dyn AudioSource>, origin: Origin) -> Self {
        let status = Arc::new(SourceStatus::default());
        let node = SourceNode::new(source, graph.master(), Arc::clone(&status));
        let node = graph.create_node(Node::Source(Box::new(node)));
        let mut sound = Self {
            graph: Arc::clone(graph),
            node,
            status,
            shared: Arc::new(SoundShared::default()),
            origin,
            info: None,
            mixer: graph.mixer().clone(),
            bus: None,
            next: None,
            volume: 1.0,
            volume_set: false,
            pan: 0.0,
            pan_set: false,
            pan_matrix: None,
            speed: 1.0,
            paused: false,
            sent_volume: None,
            sent_speed: 1.0,
            sent_paused: false,
            loop_start: 0,
            loop_end: -1,
            loop_count: 0,
            loop_set: false,
            loop_count_set: false,
            loop_released: false,
            play_id: 0,
            playing: false,
            play_when_ready: false,
        };
        sound.init();
        sound
    }

    /// Takes format defaults and installs the decoder once the format is
    /// known.
    fn init(&mut self) {
        if self.info.is_some() {
            return;
        }
        let Some(info) = self.origin.sample_info() else {
            return;
        };
        if !self.volume_set {
            self.volume = info.volume_gain();
        }
        if !self.pan_set {
            self.pan = info.pan_position();
        }
        if !self.loop_set {
            self.loop_start = info.loop_start as i32;
            self.loop_end = info.loop_end;
        }
        if !self.loop_count_set {
            self.loop_count = i32::from(info.loop_count);
        }
        let decoder = Decoder::new(&info, self.graph.max_decode_frames());
        self.send(SourceCommand::SetDecoder(Box::new(decoder)));
        self.info = Some(info);
        self.push_volume();
        self.push_speed();
    }

    fn send(&self, cmd: SourceCommand) {
        self.graph.execute(Command::Source(self.node, cmd));
    }

    /// Graph node of this sound.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Polls state that changes outside this handle. Call once per frame
    /// of the host application.
    pub fn update(&mut self) {
        self.init();
        if self.playing && self.status.done_id() == self.play_id {
            self.playing = false;
        }
        self.push_volume();
        self.push_paused();
        if self.play_when_ready && self.origin.is_ready() {
            self.play_when_ready = false;
            self.start();
        }
    }

    /// Starts playing from the beginning, or as soon as a stream has
    /// buffered enough.
    pub fn play(&mut self) {
        if self.shared.is_unloaded() {
            tracing::error!("tried to play a sound whose bank has been unloaded");
            return;
        }
        if self.is_failed() {
            tracing::error!("tried to play sound that failed to load");
            return;
        }
        self.stop();
        self.loop_released = false;
        if self.origin.is_ready() {
            self.start();
        } else {
            tracing::info!("sound is not ready; will delay until it is");
            self.play_when_ready = true;
        }
    }

    fn start(&mut self) {
        self.init();
        self.play_id = if self.play_id >= i32::MAX - 1 { 1 } else { self.play_id + 1 };
        self.push_volume();
        self.push_speed();
        self.push_paused();
        self.send(SourceCommand::SetPlaying(self.play_id));
        self.send(SourceCommand::Connect);
        self.playing = true;
    }

    /// Stops playback and rewinds.
    pub fn stop(&mut self) {
        if self.is_playing() {
            self.send(SourceCommand::SetPlaying(0));
            self.playing = false;
        }
        self.play_when_ready = false;
    }

    /// Whether the sound is playing, including as the continuation of
    /// another sound.
    pub fn is_playing(&self) -> bool {
        if self.shared.is_unloaded() {
            return false;
        }
        (self.playing && self.status.done_id() != self.play_id) || self.status.play_id() == -1
    }

    /// Whether the sound can start right away.
    pub fn is_ready(&self) -> bool {
        self.origin.is_ready() && !self.play_when_ready
    }

    /// Whether a stream could not be opened.
    pub fn is_failed(&self) -> bool {
        self.origin.is_failed()
    }

    /// Whether the bank this sound was built from has been unloaded.
    pub fn is_unloaded(&self) -> bool {
        self.shared.is_unloaded()
    }

    /// Holds playback in place.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.push_paused();
    }

    /// This sound's own pause flag.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether this sound or its mixer chain is paused.
    pub fn is_mixed_paused(&self) -> bool {
        self.paused || self.mixer.is_mixed_paused()
    }

    /// Sets the sound's own volume.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume_set = true;
        self.volume = volume.max(0.0);
        self.push_volume();
    }

    /// The sound's own volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Own volume times the mixer chain.
    pub fn mixed_volume(&self) -> f32 {
        self.volume * self.mixer.mixed_volume()
    }

    /// Pans in `[-1, 1]`: equal-power for mono sounds, balance for stereo.
    pub fn set_pan(&mut self, pan: f32) {
        self.pan_set = true;
        self.pan = pan.clamp(-1.0, 1.0);
        self.pan_matrix = None;
        self.push_volume();
    }

    /// Pan position, estimated from the matrix if one was set explicitly.
    pub fn pan(&self) -> f32 {
        match self.pan_matrix {
            Some(m) if self.channels().unwrap_or(1) < 2 => m.pan(),
            Some(m) => m.stereo_pan(),
            None => self.pan,
        }
    }

    /// Sets the channel matrix directly instead of a pan position.
    pub fn set_pan_matrix(&mut self, matrix: VolumeMatrix) {
        self.pan_set = true;
        self.pan_matrix = Some(matrix);
        self.push_volume();
    }

    /// Channel matrix before volume is applied.
    pub fn pan_matrix(&self) -> VolumeMatrix {
        if let Some(m) = self.pan_matrix {
            return m;
        }
        let mut m = VolumeMatrix::IDENTITY;
        if self.channels().unwrap_or(1) < 2 {
            m.set_pan(self.pan);
        } else {
            m.set_stereo_pan(self.pan);
        }
        m
    }

    /// Playback speed; 1 is the original pitch.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.push_speed();
    }

    /// Playback speed.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Sets the speed from a pitch shift in half steps.
    pub fn set_pitch_shift(&mut self, half_steps: f32) {
        self.set_speed((half_steps / 12.0).exp2());
    }

    /// Pitch shift in half steps implied by the speed.
    pub fn pitch_shift(&self) -> f32 {
        self.speed.log2() * 12.0
    }

    /// Moves the sound to another mixer.
    pub fn set_mixer(&mut self, mixer: &Mixer) {
        self.mixer = mixer.clone();
        self.push_volume();
        self.push_paused();
    }

    /// Mixer controlling this sound.
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Sets the loop region in frames; a negative end means the end of the
    /// sound. A start at or past a non-negative end is rejected.
    pub fn set_loop(&mut self, start: i32, end: i32) {
        let start = start.max(0);
        if end >= 0 && start >= end {
            tracing::error!(start, end, "loop start frame must be less than end frame");
            return;
        }
        self.loop_set = true;
        if (start, end) != (self.loop_start, self.loop_end) {
            self.loop_start = start;
            self.loop_end = end;
            self.send(SourceCommand::SetLoop(start, end));
        }
    }

    /// Loop region in frames.
    pub fn loop_bounds(&self) -> (i32, i32) {
        (self.loop_start, self.loop_end)
    }

    /// Times the loop region repeats; negative loops forever.
    pub fn set_loop_count(&mut self, count: i32) {
        self.loop_count_set = true;
        if count != self.loop_count {
            self.loop_count = count;
            self.send(SourceCommand::SetLoopCount(count));
        }
    }

    /// Loop repeat count.
    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Loop iteration currently playing.
    pub fn current_loop(&self) -> i32 {
        self.status.current_loop()
    }

    /// Lets playback run past the loop end.
    pub fn release_loop(&mut self) {
        self.loop_released = true;
        self.send(SourceCommand::ReleaseLoop);
    }

    /// Whether the loop was released since the last play.
    pub fn is_loop_released(&self) -> bool {
        self.loop_released
    }

    /// Seeks to `frame`.
    pub fn set_play_position(&mut self, frame: usize) {
        self.send(SourceCommand::SetPlayPosition(frame));
    }

    /// Seeks to `ms` milliseconds.
    pub fn set_play_position_ms(&mut self, ms: f32) {
        self.send(SourceCommand::SetPlayPositionMs(ms));
    }

    /// Frame playback has reached.
    pub fn play_position(&self) -> usize {
        if self.info.is_some() { self.status.frame_pos() } else { 0 }
    }

    /// Playback position in milliseconds.
    pub fn play_position_ms(&self) -> f32 {
        match self.info {
            Some(info) if info.sample_rate > 0 => {
                self.status.frame_pos() as f32 * 1000.0 / f32::from(info.sample_rate)
            }
            _ => 0.0,
        }
    }

    /// Length in frames, once known. Endless sounds report `None`.
    pub fn length(&self) -> Option<usize> {
        self.info.filter(|i| i.blocks >= 0).map(|i| i.frames())
    }

    /// Length in milliseconds, once known.
    pub fn length_ms(&self) -> Option<f32> {
        self.info.filter(|i| i.blocks >= 0).map(|i| i.length_ms())
    }

    /// Source sample rate, once known.
    pub fn sample_rate(&self) -> Option<u32> {
        self.info.map(|i| u32::from(i.sample_rate))
    }

    /// Source channel count, once known.
    pub fn channels(&self) -> Option<u8> {
        self.info.map(|i| i.channels)
    }

    /// Plays `next` sample-accurately when this sound ends, or clears the
    /// link with `None`. A sound may name itself to loop seamlessly.
    pub fn set_next(&mut self, next: Option<&Sound<T>>) {
        self.next = next.map(Sound::node_id);
        self.send(SourceCommand::SetNext(self.next));
    }

    /// Node of the sound that follows this one.
    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Routes the sound through `bus`, or straight to the master mix with
    /// `None`.
    pub fn set_effect_bus(&mut self, bus: Option<&EffectBus<T>>) {
        let target = bus.map(EffectBus::id);
        if target != self.bus {
            self.bus = target;
            self.send(SourceCommand::SetOutput(target.unwrap_or_else(|| self.graph.master())));
        }
    }

    /// Bus the sound is routed through.
    pub fn effect_bus(&self) -> Option<NodeId> {
        // A removed bus hands its inputs back to the master mix.
        self.bus.filter(|&id| self.graph.is_node_live(id))
    }

    fn final_volume(&self) -> VolumeMatrix {
        let mut m = self.pan_matrix();
        m *= self.mixed_volume();
        m
    }

    fn push_volume(&mut self) {
        if self.info.is_none() {
            return;
        }
        let volume = self.final_volume();
        if self.sent_volume != Some(volume) {
            self.sent_volume = Some(volume);
            self.send(SourceCommand::SetVolume(volume));
        }
    }

    fn push_speed(&mut self) {
        if self.info.is_some() && self.speed != self.sent_speed {
            self.sent_speed = self.speed;
            self.send(SourceCommand::SetSpeed(self.speed));
        }
    }

    fn push_paused(&mut self) {
        let paused = self.is_mixed_paused();
        if paused != self.sent_paused {
            self.sent_paused = paused;
            self.send(SourceCommand::SetPaused(paused));
        }
    }
}

impl<T: Sample> Drop for Sound<T> {
    fn drop(&mut self) {
        self.stop();
        self.graph.destroy_node(self.node);
    }
}

impl<T: Sample> std::fmt::Debug for Sound<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("node", &self.node)
            .field("info", &self.info)
            .field("playing", &self.is_playing())
            .field("volume", &self.volume)
            .field("pan", &self.pan)
            .field("speed", &self.speed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BankWriter;
    use crate::format::AudioFormat;
    use crate::output::ManualOutput;
    use cricket_config::EngineConfig;

    fn graph() -> Arc<AudioGraph<f32>> {
        AudioGraph::new(&EngineConfig {
            sample_rate: 8000,
            audio_update_ms: 8.0,
            ..EngineConfig::default()
        })
    }

    fn bank(frames: usize, value: i16) -> Arc<Bank> {
        let pcm: Vec<u8> = std::iter::repeat_n(value, frames).flat_map(i16::to_le_bytes).collect();
        let info = SampleInfo::new(AudioFormat::PcmI16, 1, 8000, frames);
        let mut writer = BankWriter::new("test");
        writer.add("tone", info, pcm);
        Bank::from_bytes(writer.to_bytes()).unwrap()
    }

    #[test]
    fn plays_to_the_end_and_reports_done() {
        let graph = graph();
        let bank = bank(100, 16384);
        let mut sound = Sound::from_bank_name(&graph, &bank, "tone").unwrap();
        sound.set_pan_matrix(VolumeMatrix::IDENTITY);
        let mut out = ManualOutput::new(&graph);
        sound.play();
        assert!(sound.is_playing());

        let block = out.render(64).to_vec();
        assert_eq!(block[0], f32::from_i16(16384));
        out.render(64);
        sound.update();
        assert!(!sound.is_playing());
        assert_eq!(sound.length(), Some(100));
    }

    #[test]
    fn mixer_volume_reaches_the_node() {
        let graph = graph();
        let bank = bank(64, 16384);
        let mut sound = Sound::from_bank(&graph, &bank, 0).unwrap();
        sound.set_pan_matrix(VolumeMatrix::IDENTITY);
        graph.mixer().set_volume(0.5);
        sound.update();
        assert_eq!(sound.mixed_volume(), 0.5);
        sound.play();

        let mut out = ManualOutput::new(&graph);
        let block = out.render(32);
        assert_eq!(block[0], f32::from_i16(16384) * 0.5);
    }

    #[test]
    fn unloading_the_bank_stops_its_sounds() {
        let graph = graph();
        let bank = bank(4000, 1000);
        let mut sound = Sound::from_bank(&graph, &bank, 0).unwrap();
        sound.play();
        bank.unload_sounds();
        assert!(sound.is_unloaded());

        let mut out = ManualOutput::new(&graph);
        assert!(out.render(32).iter().all(|s| *s == 0.0));
        sound.play();
        assert!(!sound.is_playing());
    }

    #[test]
    fn invalid_loop_is_rejected() {
        let graph = graph();
        let bank = bank(64, 0);
        let mut sound = Sound::from_bank(&graph, &bank, 0).unwrap();
        sound.set_loop(10, 5);
        assert_eq!(sound.loop_bounds(), (0, -1));
        sound.set_loop(-4, 20);
        assert_eq!(sound.loop_bounds(), (0, 20));
        assert!(Sound::from_bank(&graph, &bank, 3).is_none());
    }

    #[test]
    fn pitch_shift_maps_to_speed() {
        let graph = graph();
        let mut sound = Sound::sine(&graph, 440.0);
        sound.set_pitch_shift(12.0);
        assert!((sound.speed() - 2.0).abs() < 1e-6);
        assert!((sound.pitch_shift() - 12.0).abs() < 1e-4);
        assert_eq!(sound.length(), None);
    }
}
