//! Playback node for one source.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use cricket_core::{Sample, VolumeMatrix, mono_pan, stereo_pan};

use super::{Node, RenderState};
use crate::arena::NodeId;
use crate::decoder::Decoder;
use crate::pool::BufferHandle;
use crate::source::AudioSource;

/// Playback state published by a source node for its control-thread handle.
#[derive(Debug, Default)]
pub struct SourceStatus {
    play_id: AtomicI32,
    done_id: AtomicI32,
    current_loop: AtomicI32,
    frame: AtomicUsize,
}

impl SourceStatus {
    /// Id of the current playback; 0 when stopped, -1 when started by a
    /// preceding sound.
    pub fn play_id(&self) -> i32 {
        self.play_id.load(Ordering::Acquire)
    }

    /// Id of the most recent playback that ran to completion.
    pub fn done_id(&self) -> i32 {
        self.done_id.load(Ordering::Acquire)
    }

    /// Loop repetitions completed.
    pub fn current_loop(&self) -> i32 {
        self.current_loop.load(Ordering::Relaxed)
    }

    /// Frame the next render starts at.
    pub fn frame_pos(&self) -> usize {
        self.frame.load(Ordering::Relaxed)
    }
}

/// Operations on a source node.
#[derive(Debug)]
pub enum SourceCommand {
    /// Installs the decoder once the source format is known.
    SetDecoder(Box<Decoder>),
    /// Loop repeat count; negative loops forever.
    SetLoopCount(i32),
    /// Lets playback continue past the loop end.
    ReleaseLoop,
    /// Loop region in frames; a negative end means the end of the sound.
    SetLoop(i32, i32),
    /// Mix node the source feeds.
    SetOutput(NodeId),
    /// Adds the source to its output mix.
    Connect,
    /// Removes the source from its output mix.
    Disconnect,
    /// Source started, sample-accurately, when this one finishes.
    SetNext(Option<NodeId>),
    /// Playback speed; 1 is native pitch.
    SetSpeed(f32),
    /// Target volume matrix, reached by ramping.
    SetVolume(VolumeMatrix),
    /// Holds playback without losing position.
    SetPaused(bool),
    /// Starts playback with a new id, or stops it with 0.
    SetPlaying(i32),
    /// Seeks to a frame before the next render.
    SetPlayPosition(usize),
    /// Seeks to a time in milliseconds before the next render.
    SetPlayPositionMs(f32),
}

/// How a command changed the node's place in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Routing {
    Stay,
    Attach(NodeId),
    Detach(NodeId),
    Move { from: NodeId, to: NodeId },
}

#[derive(Debug, Clone, Copy)]
enum Seek {
    Frame(usize),
    Ms(f32),
}

/// Decodes, resamples and pans one source into a stereo buffer.
pub struct SourceNode<T> {
    source: Box<dyn AudioSource>,
    decoder: Option<Decoder>,
    status: Arc<SourceStatus>,
    sample_rate: f32,
    output: NodeId,
    connected: bool,
    next: Option<NodeId>,
    speed: f32,
    volume: VolumeMatrix,
    target: VolumeMatrix,
    paused: bool,
    play_id: i32,
    done_id: i32,
    seek: Option<Seek>,
    out_offset: Option<usize>,
    last: [T; 2],
}

impl<T: Sample> SourceNode<T> {
    pub(crate) fn new(source: Box<dyn AudioSource>, output: NodeId, status: Arc<SourceStatus>) -> Self {
        let sample_rate = source
            .sample_info()
            .map_or(0.0, |info| f32::from(info.sample_rate));
        Self {
            source,
            decoder: None,
            status,
            sample_rate,
            output,
            connected: false,
            next: None,
            speed: 1.0,
            volume: VolumeMatrix::IDENTITY,
            target: VolumeMatrix::IDENTITY,
            paused: false,
            play_id: 0,
            done_id: 0,
            seek: None,
            out_offset: None,
            last: [T::ZERO; 2],
        }
    }

    /// Mix node this source feeds.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Shared playback status.
    pub fn status(&self) -> &Arc<SourceStatus> {
        &self.status
    }

    /// Whether the source is in its output mix.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_output_silently(&mut self, output: NodeId) {
        self.output = output;
    }

    pub(crate) fn apply(&mut self, cmd: SourceCommand) -> Routing {
        match cmd {
            SourceCommand::SetDecoder(decoder) => {
                if let Some(info) = self.source.sample_info() {
                    self.sample_rate = f32::from(info.sample_rate);
                }
                self.decoder = Some(*decoder);
            }
            SourceCommand::SetLoopCount(count) => self.source.set_loop_count(count),
            SourceCommand::ReleaseLoop => self.source.release_loop(),
            SourceCommand::SetLoop(start, end) => self.source.set_loop(start, end),
            SourceCommand::SetOutput(mix) => {
                let from = std::mem::replace(&mut self.output, mix);
                if self.connected && from != mix {
                    return Routing::Move { from, to: mix };
                }
            }
            SourceCommand::Connect => {
                if !self.connected {
                    self.connected = true;
                    return Routing::Attach(self.output);
                }
            }
            SourceCommand::Disconnect => return self.disconnect(),
            SourceCommand::SetNext(next) => self.next = next,
            SourceCommand::SetSpeed(speed) => self.speed = speed,
            SourceCommand::SetVolume(volume) => self.target = volume,
            SourceCommand::SetPaused(paused) => {
                if paused != self.paused {
                    self.volume = self.target;
                    self.paused = paused;
                }
            }
            SourceCommand::SetPlaying(id) => {
                if id != self.play_id {
                    let mut routing = Routing::Stay;
                    if id == 0 {
                        self.rewind();
                        routing = self.disconnect();
                    }
                    self.volume = self.target;
                    self.play_id = id;
                    self.last = [T::ZERO; 2];
                    self.publish();
                    return routing;
                }
            }
            SourceCommand::SetPlayPosition(frame) => self.seek = Some(Seek::Frame(frame)),
            SourceCommand::SetPlayPositionMs(ms) => self.seek = Some(Seek::Ms(ms)),
        }
        Routing::Stay
    }

    fn disconnect(&mut self) -> Routing {
        if self.connected {
            self.connected = false;
            Routing::Detach(self.output)
        } else {
            Routing::Stay
        }
    }

    fn rewind(&mut self) {
        self.source.reset();
        if let Some(decoder) = &mut self.decoder {
            decoder.reset();
        }
    }

    /// Starts playing as the successor of a finished source, carrying its
    /// resampler state. `offset` is where the predecessor's output ended
    /// inside the current quantum.
    fn take_over(&mut self, last: [T; 2], offset: Option<usize>, needs_post: &mut bool) {
        self.play_id = -1;
        self.volume = self.target;
        self.last = last;
        if let Some(offset) = offset {
            self.out_offset = Some(offset);
            *needs_post = true;
        }
    }

    fn publish(&self) {
        self.status.play_id.store(self.play_id, Ordering::Release);
        self.status.done_id.store(self.done_id, Ordering::Release);
        self.status
            .current_loop
            .store(self.source.current_loop(), Ordering::Relaxed);
        if let Some(decoder) = &self.decoder {
            self.status
                .frame
                .store(decoder.frame_pos(&*self.source), Ordering::Relaxed);
        }
    }

    pub(crate) fn render(
        &mut self,
        st: &mut RenderState<T>,
        self_id: NodeId,
        frames: usize,
        post: bool,
        needs_post: &mut bool,
    ) -> Option<BufferHandle> {
        let offset = if post {
            self.out_offset.take()?
        } else {
            self.out_offset = None;
            0
        };
        let mut decoder = self.decoder.take()?;
        let out = self.render_with(&mut decoder, st, self_id, frames, offset, needs_post);
        self.decoder = Some(decoder);
        self.publish();
        out
    }

    fn render_with(
        &mut self,
        decoder: &mut Decoder,
        st: &mut RenderState<T>,
        self_id: NodeId,
        frames: usize,
        offset: usize,
        needs_post: &mut bool,
    ) -> Option<BufferHandle> {
        if !self.source.is_inited() {
            return None;
        }
        if let Some(seek) = self.seek.take() {
            let frame = match seek {
                Seek::Frame(frame) => frame,
                Seek::Ms(ms) => (ms * 0.001 * self.sample_rate).round().max(0.0) as usize,
            };
            decoder.set_frame_pos(&mut *self.source, frame);
        }
        if self.play_id == 0 || self.paused || !self.source.is_ready() || self.speed <= 0.0 {
            return None;
        }

        let out_req = frames - offset;
        let ch = decoder.channels();
        let max_frames = st.pool.buffer_len() / 2;
        let mut factor = self.speed * self.sample_rate / st.sample_rate;
        let mut in_req = (out_req as f32 * factor).round() as usize;
        if offset + in_req > max_frames {
            in_req = max_frames - offset;
            factor = in_req as f32 / out_req as f32;
        }

        let decoded_buf = st.pool.acquire();
        let decoded = decoder.decode(
            &mut *self.source,
            &mut st.pool.get_mut(decoded_buf)[offset * ch..(offset + in_req) * ch],
            in_req,
        );
        let out_frames = if decoded < in_req {
            ((decoded as f32 / factor).round() as usize).min(out_req)
        } else {
            out_req
        };

        let resampled = if decoded == out_frames {
            if decoded > 0 {
                let data = st.pool.get(decoded_buf);
                let tail = (offset + decoded - 1) * ch;
                self.last[..ch].copy_from_slice(&data[tail..tail + ch]);
            }
            decoded_buf
        } else {
            let buf = st.pool.acquire();
            let (src, dst) = st.pool.pair_mut(decoded_buf, buf);
            T::resample(
                &mut self.last,
                &src[offset * ch..],
                decoded,
                &mut dst[offset * ch..],
                out_frames,
                ch,
            );
            st.pool.release(decoded_buf);
            buf
        };

        let out = if ch == 1 {
            let buf = st.pool.acquire();
            let (src, dst) = st.pool.pair_mut(resampled, buf);
            mono_pan(
                &src[offset..],
                &mut dst[offset * 2..],
                out_frames,
                &self.target,
                &mut self.volume,
                st.volume_rate,
            );
            st.pool.release(resampled);
            buf
        } else {
            stereo_pan(
                &mut st.pool.get_mut(resampled)[offset * 2..],
                out_frames,
                &self.target,
                &mut self.volume,
                st.volume_rate,
            );
            resampled
        };

        let data = st.pool.get_mut(out);
        data[..offset * 2].fill(T::ZERO);
        data[(offset + out_frames) * 2..frames * 2].fill(T::ZERO);

        if decoder.is_done(&*self.source) {
            let tail = (out_frames < out_req).then_some(offset + out_frames);
            let next = self.next;
            match next {
                Some(next) if next == self_id => {
                    let last = self.last;
                    self.take_over(last, tail, needs_post);
                }
                Some(next) => {
                    if let Some(Node::Source(node)) = st.nodes.get_mut(next.0) {
                        node.take_over(self.last, tail, needs_post);
                        if !node.connected {
                            node.connected = true;
                            st.pending_connects.push((node.output, next));
                        }
                        node.publish();
                    }
                }
                None => {}
            }

            self.source.reset();
            decoder.reset();

            if self.next != Some(self_id) {
                if self.connected {
                    self.connected = false;
                    st.pending_disconnects.push((self.output, self_id));
                }
                self.done_id = self.play_id;
                self.play_id = 0;
                self.last = [T::ZERO; 2];
            }
        }
        Some(out)
    }
}
