//! Graph root: the renderer owned by the audio thread and the
//! [`AudioGraph`] every control thread talks to.
//!
//! The node tree is `sources → master mix → global effect bus → output`.
//! Control threads never touch nodes. They queue [`Command`]s, which the
//! renderer drains right before each render (or [`AudioGraph::update`] drains
//! while no output is running). Anything the audio thread lets go of travels
//! back over a disposal channel and is dropped by `update`, so rendering
//! never frees memory.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use cricket_config::EngineConfig;
use cricket_core::{Sample, clamp, volume_rate};
use parking_lot::{Mutex, MutexGuard};

use crate::arena::{EffectId, IdAllocator, NodeId};
use crate::command::Command;
use crate::effect::EffectSlot;
use crate::mixer::Mixer;
use crate::node::source::Routing;
use crate::node::{EffectBusNode, MixNode, Node, RenderState, render_node};
use crate::pool::BufferPool;
use crate::queue::CommandQueue;
use crate::throttle::Throttle;
use crate::writer::AudioWriter;

/// Scratch buffers allocated up front; mix nodes add one each.
const BASE_BUFFERS: usize = 8;

/// Mix buffers the pool's slot table has room for without reallocating.
const RESERVED_MIX_BUFFERS: usize = 64;

/// Smoothing applied to the reported render load.
const LOAD_SMOOTHING: f32 = 0.9;

/// Counters the renderer publishes for control threads.
#[derive(Debug, Default)]
pub struct GraphStats {
    clipped: AtomicBool,
    render_load: AtomicU32,
}

impl GraphStats {
    /// Whether any output sample was clamped since the last reset.
    pub fn clipped(&self) -> bool {
        self.clipped.load(Ordering::Relaxed)
    }

    /// Clears the clip flag.
    pub fn reset_clip(&self) {
        self.clipped.store(false, Ordering::Relaxed);
    }

    /// Smoothed render time over real time (1.0 is a full quantum).
    pub fn render_load(&self) -> f32 {
        f32::from_bits(self.render_load.load(Ordering::Relaxed))
    }
}

/// Something the audio thread no longer uses, dropped on a control thread.
#[allow(dead_code)]
pub(crate) enum Disposal<T> {
    Node(Node<T>),
    Effect(EffectSlot),
    Command(Command<T>),
    Value(Box<dyn Any + Send>),
    Writer(Box<dyn AudioWriter<T>>),
}

/// Audio-thread half of the graph.
pub struct GraphRenderer<T: Sample> {
    state: RenderState<T>,
    queue: Arc<CommandQueue<Command<T>>>,
    gate: Arc<Mutex<()>>,
    disposal: Sender<Disposal<T>>,
    root: NodeId,
    master: NodeId,
    capture: Option<Box<dyn AudioWriter<T>>>,
    stats: Arc<GraphStats>,
    lock_warn: Throttle,
    load_avg: f32,
}

impl<T: Sample> GraphRenderer<T> {
    /// Applies every queued command, unless a control thread holds the
    /// audio lock.
    fn drain(&mut self) {
        let gate = Arc::clone(&self.gate);
        let Some(_guard) = gate.try_lock() else {
            if self.lock_warn.ready() {
                tracing::warn!("Audio thread could not acquire lock; did you call lock_audio() without releasing it?");
            }
            return;
        };
        while let Some(cmd) = self.queue.consume() {
            self.apply(cmd);
        }
    }

    fn dispose(&self, item: Disposal<T>) {
        // The receiver only goes away with the graph; the item is dropped here then.
        let _ = self.disposal.send(item);
    }

    fn apply(&mut self, cmd: Command<T>) {
        let st = &mut self.state;
        match cmd {
            Command::InsertNode(id, mut node) => {
                node.attach(&mut st.pool);
                if let Some(mut stale) = st.nodes.insert(id.0, node) {
                    stale.detach(&mut st.pool);
                    self.dispose(Disposal::Node(stale));
                }
            }
            Command::RemoveNode(id) => self.remove_node(id),
            Command::AddInput { mix, input } => st.add_input(mix, input),
            Command::RemoveInput { mix, input } => st.remove_input(mix, input),
            Command::Source(id, cmd) => {
                let Some(Node::Source(node)) = st.nodes.get_mut(id.0) else {
                    self.dispose(Disposal::Command(Command::Source(id, cmd)));
                    return;
                };
                match node.apply(cmd) {
                    Routing::Stay => {}
                    Routing::Attach(mix) => st.add_input(mix, id),
                    Routing::Detach(mix) => st.remove_input(mix, id),
                    Routing::Move { from, to } => {
                        st.remove_input(from, id);
                        st.add_input(to, id);
                    }
                }
            }
            Command::Bus(id, cmd) => {
                let Some(Node::EffectBus(bus)) = st.nodes.get_mut(id.0) else {
                    return;
                };
                if let Some((owner, fx)) = bus.apply(id, cmd, &mut st.effects) {
                    if let Some(Node::EffectBus(old)) = st.nodes.get_mut(owner.0) {
                        old.forget_effect(fx);
                    }
                }
            }
            Command::InsertEffect(id, slot) => {
                if let Some(stale) = st.effects.insert(id.0, slot) {
                    self.dispose(Disposal::Effect(stale));
                }
            }
            Command::RemoveEffect(id) => {
                let Some(slot) = st.effects.remove(id.0) else {
                    return;
                };
                if let Some(Node::EffectBus(bus)) = slot.owner.and_then(|o| st.nodes.get_mut(o.0)) {
                    bus.forget_effect(id);
                }
                self.dispose(Disposal::Effect(slot));
            }
            Command::Effect(id, cmd) => {
                if let Some(slot) = st.effects.get_mut(id.0) {
                    slot.apply(cmd);
                }
            }
            Command::Free(value) => self.dispose(Disposal::Value(value)),
            Command::StartCapture(writer) => {
                if let Some(old) = self.capture.replace(writer) {
                    self.dispose(Disposal::Writer(old));
                }
            }
            Command::StopCapture => {
                if let Some(old) = self.capture.take() {
                    self.dispose(Disposal::Writer(old));
                }
            }
        }
    }

    /// Removes a node. Whatever was routed into a removed mix or bus moves
    /// to the master mix.
    fn remove_node(&mut self, id: NodeId) {
        if id == self.master || id == self.root {
            tracing::warn!(?id, "the master mix and global bus cannot be removed");
            return;
        }
        let master = self.master;
        let st = &mut self.state;
        let Some(mut node) = st.nodes.remove(id.0) else {
            return;
        };
        if let Node::Source(source) = &node {
            if source.is_connected() {
                st.remove_input(source.output(), id);
            }
        } else {
            if let Node::EffectBus(bus) = &mut node {
                bus.release_effects(&mut st.effects);
            }
            if let Some(mix) = node.mix_mut() {
                for &input in mix.inputs() {
                    st.add_input(master, input);
                }
            }
            for (_, other) in st.nodes.iter_mut() {
                match other {
                    Node::Source(source) if source.output() == id => source.set_output_silently(master),
                    other => {
                        if let Some(mix) = other.mix_mut() {
                            mix.remove_input(id);
                        }
                    }
                }
            }
        }
        node.detach(&mut st.pool);
        self.dispose(Disposal::Node(node));
    }

    /// Renders `out.len() / 2` interleaved stereo frames into `out`.
    ///
    /// Requests longer than the scratch buffers are split into chunks of
    /// nearly equal length.
    pub fn render(&mut self, out: &mut [T]) {
        let started = Instant::now();
        self.drain();

        let frames = out.len() / 2;
        let max = (self.state.pool.buffer_len() / 2).max(1);
        let chunks = frames.div_ceil(max).max(1);
        let mut clipped = false;
        let mut done = 0;
        for i in 0..chunks {
            let n = (frames - done) / (chunks - i);
            clipped |= self.render_chunk(&mut out[done * 2..(done + n) * 2], n);
            done += n;
        }

        if clipped {
            self.stats.clipped.store(true, Ordering::Relaxed);
        }
        if frames > 0 {
            let real_ms = frames as f32 * 1000.0 / self.state.sample_rate;
            let load = started.elapsed().as_secs_f32() * 1000.0 / real_ms;
            self.load_avg = self.load_avg * LOAD_SMOOTHING + load * (1.0 - LOAD_SMOOTHING);
            self.stats.render_load.store(self.load_avg.to_bits(), Ordering::Relaxed);
        }
    }

    fn render_chunk(&mut self, out: &mut [T], frames: usize) -> bool {
        let st = &mut self.state;
        st.budget.start();

        let mut needs_post = false;
        let mut acc = render_node(st, self.root, frames, false, &mut needs_post);
        st.apply_connects();
        while needs_post {
            needs_post = false;
            if let Some(extra) = render_node(st, self.root, frames, true, &mut needs_post) {
                match acc {
                    Some(handle) => {
                        let (src, dst) = st.pool.pair_mut(extra, handle);
                        cricket_core::mix::mix(&src[..frames * 2], &mut dst[..frames * 2]);
                        st.pool.release(extra);
                    }
                    None => acc = Some(extra),
                }
            }
            st.apply_connects();
        }

        let clipped = match acc {
            Some(handle) => {
                let clipped = clamp(&st.pool.get(handle)[..frames * 2], out);
                st.pool.release(handle);
                clipped
            }
            None => {
                out.fill(T::ZERO);
                false
            }
        };
        st.apply_disconnects();

        if let Some(writer) = &mut self.capture {
            if writer.write(out) < out.len() {
                tracing::error!("Capture failed; closing file");
                if let Some(writer) = self.capture.take() {
                    self.dispose(Disposal::Writer(writer));
                }
            }
        }
        clipped
    }
}

/// Handle an output backend renders through.
pub struct RenderHandle<T: Sample> {
    renderer: Arc<Mutex<GraphRenderer<T>>>,
    running: Arc<AtomicBool>,
    sample_rate: u32,
}

impl<T: Sample> Clone for RenderHandle<T> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
            running: Arc::clone(&self.running),
            sample_rate: self.sample_rate,
        }
    }
}

impl<T: Sample> RenderHandle<T> {
    /// Fills `out` with interleaved stereo frames. Returns false (and
    /// writes silence) if the renderer is busy elsewhere.
    pub fn render(&self, out: &mut [T]) -> bool {
        match self.renderer.try_lock() {
            Some(mut renderer) => {
                renderer.render(out);
                true
            }
            None => {
                out.fill(T::ZERO);
                false
            }
        }
    }

    /// Marks the output as started or stopped. While stopped,
    /// [`AudioGraph::update`] applies commands itself.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Graph sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Control-thread side of the render graph.
///
/// Shared by every handle through an `Arc`; all methods take `&self` and
/// may be called from any thread.
pub struct AudioGraph<T: Sample> {
    config: EngineConfig,
    queue: Arc<CommandQueue<Command<T>>>,
    gate: Arc<Mutex<()>>,
    renderer: Arc<Mutex<GraphRenderer<T>>>,
    running: Arc<AtomicBool>,
    stats: Arc<GraphStats>,
    disposal: Receiver<Disposal<T>>,
    node_ids: Mutex<IdAllocator>,
    effect_ids: Mutex<IdAllocator>,
    mixer: Mixer,
    master: NodeId,
    global_bus: NodeId,
    buffer_len: usize,
}

impl<T: Sample> AudioGraph<T> {
    /// Builds a graph for `config`, after clamping invalid settings.
    pub fn new(config: &EngineConfig) -> Arc<Self> {
        let config = config.validated();
        let frames = config.frames_per_update().max(1);
        // Two quanta of stereo: room for speed-up and for chunked renders.
        let buffer_len = frames * 4;
        let sample_rate = config.sample_rate as f32;
        let state = RenderState::new(
            BufferPool::with_reserve(BASE_BUFFERS, buffer_len, RESERVED_MIX_BUFFERS),
            sample_rate,
            volume_rate(config.volume_ramp_ms, sample_rate),
            config.audio_update_ms * config.max_render_load,
        );

        let mut node_ids = IdAllocator::new();
        let master = NodeId(node_ids.allocate());
        let global_bus = NodeId(node_ids.allocate());

        let queue = Arc::new(CommandQueue::new(config.max_audio_tasks));
        let gate = Arc::new(Mutex::new(()));
        let stats = Arc::new(GraphStats::default());
        let (disposal_tx, disposal_rx) = crossbeam_channel::unbounded();

        let mut renderer = GraphRenderer {
            state,
            queue: Arc::clone(&queue),
            gate: Arc::clone(&gate),
            disposal: disposal_tx,
            root: global_bus,
            master,
            capture: None,
            stats: Arc::clone(&stats),
            lock_warn: Throttle::default(),
            load_avg: 0.0,
        };
        let mix = || MixNode::new(vec![T::ZERO; buffer_len]);
        renderer.apply(Command::InsertNode(master, Node::Mix(mix())));
        renderer.apply(Command::InsertNode(
            global_bus,
            Node::EffectBus(Box::new(EffectBusNode::new(mix()))),
        ));
        renderer.apply(Command::AddInput {
            mix: global_bus,
            input: master,
        });

        tracing::info!(
            sample_rate = config.sample_rate,
            sample_type = T::TYPE.name(),
            frames_per_update = frames,
            max_render_ms = config.audio_update_ms * config.max_render_load,
            "audio graph created"
        );

        Arc::new(Self {
            config,
            queue,
            gate,
            renderer: Arc::new(Mutex::new(renderer)),
            running: Arc::new(AtomicBool::new(false)),
            stats,
            disposal: disposal_rx,
            node_ids: Mutex::new(node_ids),
            effect_ids: Mutex::new(IdAllocator::new()),
            mixer: Mixer::new(),
            master,
            global_bus,
            buffer_len,
        })
    }

    /// Queues `cmd` for the audio thread.
    pub fn execute(&self, cmd: Command<T>) {
        self.queue.produce(cmd);
    }

    /// Frees `value` once every command queued before it has been applied.
    pub fn free(&self, value: Box<dyn Any + Send>) {
        self.execute(Command::Free(value));
    }

    /// Drops `value` once every command queued before it has been applied.
    pub fn delete<D: Send + 'static>(&self, value: D) {
        self.free(Box::new(value));
    }

    /// Keeps the audio thread from applying commands while the guard lives,
    /// so a batch of commands takes effect in the same quantum.
    pub fn lock_audio(&self) -> MutexGuard<'_, ()> {
        self.gate.lock()
    }

    /// Control-thread housekeeping: applies commands while no output is
    /// running and drops whatever the audio thread has released.
    pub fn update(&self) {
        if !self.is_running() {
            if let Some(mut renderer) = self.renderer.try_lock() {
                renderer.drain();
            }
        }
        for item in self.disposal.try_iter() {
            drop(item);
        }
    }

    /// Whether an output is driving the renderer.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Mix every sound feeds by default.
    pub fn master(&self) -> NodeId {
        self.master
    }

    /// Effect bus between the master mix and the output.
    pub fn global_bus(&self) -> NodeId {
        self.global_bus
    }

    /// Root of the volume/pause hierarchy.
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Settings in effect, after validation.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Renderer handle for an output backend.
    pub fn render_handle(&self) -> RenderHandle<T> {
        RenderHandle {
            renderer: Arc::clone(&self.renderer),
            running: Arc::clone(&self.running),
            sample_rate: self.config.sample_rate,
        }
    }

    /// Renderer statistics.
    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Whether output clipped since the last [`reset_clip`](Self::reset_clip).
    pub fn clipped(&self) -> bool {
        self.stats.clipped()
    }

    /// Clears the clip flag.
    pub fn reset_clip(&self) {
        self.stats.reset_clip();
    }

    /// Smoothed render load.
    pub fn render_load(&self) -> f32 {
        self.stats.render_load()
    }

    /// Whether `id` names a node that has not been destroyed.
    pub fn is_node_live(&self, id: NodeId) -> bool {
        self.node_ids.lock().is_live(id.0)
    }

    /// Starts writing the mixed output to `writer`.
    pub fn start_capture(&self, writer: impl AudioWriter<T> + 'static) {
        self.execute(Command::StartCapture(Box::new(writer)));
    }

    /// Stops capturing; the writer is closed by the next [`update`](Self::update).
    pub fn stop_capture(&self) {
        self.execute(Command::StopCapture);
    }

    /// Largest number of frames a source decodes in one render.
    pub(crate) fn max_decode_frames(&self) -> usize {
        self.buffer_len / 2
    }

    /// Mix node carrying its own pool buffer.
    pub(crate) fn new_mix_node(&self) -> MixNode<T> {
        MixNode::new(vec![T::ZERO; self.buffer_len])
    }

    pub(crate) fn create_node(&self, node: Node<T>) -> NodeId {
        let id = NodeId(self.node_ids.lock().allocate());
        self.execute(Command::InsertNode(id, node));
        id
    }

    pub(crate) fn destroy_node(&self, id: NodeId) {
        if self.node_ids.lock().release(id.0) {
            self.execute(Command::RemoveNode(id));
        }
    }

    pub(crate) fn create_effect(&self, slot: EffectSlot) -> EffectId {
        let id = EffectId(self.effect_ids.lock().allocate());
        self.execute(Command::InsertEffect(id, slot));
        id
    }

    pub(crate) fn destroy_effect(&self, id: EffectId) {
        if self.effect_ids.lock().release(id.0) {
            self.execute(Command::RemoveEffect(id));
        }
    }
}

impl<T: Sample> std::fmt::Debug for AudioGraph<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("sample_rate", &self.config.sample_rate)
            .field("sample_type", &T::TYPE)
            .field("master", &self.master)
            .field("global_bus", &self.global_bus)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
