//! Render graph nodes.
//!
//! Nodes live in an arena owned by the audio thread and refer to each other by
//! [`NodeId`]. Rendering a node temporarily takes it out of its slot, so a
//! parent can recurse into its inputs while holding `&mut` to the rest of the
//! graph; a node that refers to itself (or to an ancestor) simply finds an
//! empty slot and contributes nothing.
//!
//! Every render returns either a pool buffer holding `frames` interleaved
//! stereo frames, owned by the caller, or `None` for an inactive node.

pub mod effect_bus;
pub mod mix;
pub mod source;

use std::time::Instant;

use cricket_core::Sample;

pub use effect_bus::{BusCommand, EffectBusNode};
pub use mix::MixNode;
pub use source::{SourceCommand, SourceNode, SourceStatus};

use crate::arena::{NodeId, Slots};
use crate::effect::EffectSlot;
use crate::pool::{BufferHandle, BufferPool};
use crate::throttle::Throttle;

/// A node in the render graph.
pub enum Node<T> {
    /// Sums inputs.
    Mix(MixNode<T>),
    /// Plays one source.
    Source(Box<SourceNode<T>>),
    /// Mix followed by an effect chain.
    EffectBus(Box<EffectBusNode<T>>),
}

impl<T: Sample> Node<T> {
    /// The mix this node accepts inputs into, if any.
    pub(crate) fn mix_mut(&mut self) -> Option<&mut MixNode<T>> {
        match self {
            Node::Mix(mix) => Some(mix),
            Node::EffectBus(bus) => Some(bus.input_mut()),
            Node::Source(_) => None,
        }
    }

    pub(crate) fn attach(&mut self, pool: &mut BufferPool<T>) {
        if let Some(mix) = self.mix_mut() {
            mix.attach(pool);
        }
    }

    pub(crate) fn detach(&mut self, pool: &mut BufferPool<T>) {
        if let Some(mix) = self.mix_mut() {
            mix.detach(pool);
        }
    }
}

/// Per-quantum time limit enforced by mix nodes.
pub(crate) struct RenderBudget {
    started: Instant,
    limit_ms: f32,
    warn: Throttle,
}

impl RenderBudget {
    pub(crate) fn new(limit_ms: f32) -> Self {
        Self {
            started: Instant::now(),
            limit_ms,
            warn: Throttle::default(),
        }
    }

    pub(crate) fn start(&mut self) {
        self.started = Instant::now();
    }

    pub(crate) fn elapsed_ms(&self) -> f32 {
        self.started.elapsed().as_secs_f32() * 1000.0
    }

    /// Whether the quantum ran out of time; warns at most every 500 ms.
    pub(crate) fn exceeded(&mut self) -> bool {
        let ms = self.elapsed_ms();
        if ms <= self.limit_ms {
            return false;
        }
        if self.warn.ready() {
            tracing::warn!(
                render_ms = ms,
                limit_ms = self.limit_ms,
                "Audio rendering is taking too long; some sounds will not be played"
            );
        }
        true
    }
}

/// Everything a render pass touches.
pub(crate) struct RenderState<T> {
    pub(crate) nodes: Slots<Node<T>>,
    pub(crate) effects: Slots<EffectSlot>,
    pub(crate) pool: BufferPool<T>,
    pub(crate) sample_rate: f32,
    pub(crate) volume_rate: f32,
    pub(crate) budget: RenderBudget,
    /// `(mix, input)` pairs to connect once the current pass is over.
    pub(crate) pending_connects: Vec<(NodeId, NodeId)>,
    /// `(mix, input)` pairs to disconnect once the quantum is over.
    pub(crate) pending_disconnects: Vec<(NodeId, NodeId)>,
}

impl<T: Sample> RenderState<T> {
    pub(crate) fn new(pool: BufferPool<T>, sample_rate: f32, volume_rate: f32, limit_ms: f32) -> Self {
        Self {
            nodes: Slots::with_capacity(64),
            effects: Slots::with_capacity(16),
            pool,
            sample_rate,
            volume_rate,
            budget: RenderBudget::new(limit_ms),
            pending_connects: Vec::with_capacity(16),
            pending_disconnects: Vec::with_capacity(16),
        }
    }

    pub(crate) fn add_input(&mut self, mix: NodeId, input: NodeId) {
        if let Some(m) = self.nodes.get_mut(mix.0).and_then(Node::mix_mut) {
            m.add_input(input);
        }
    }

    pub(crate) fn remove_input(&mut self, mix: NodeId, input: NodeId) {
        if let Some(m) = self.nodes.get_mut(mix.0).and_then(Node::mix_mut) {
            m.remove_input(input);
        }
    }

    pub(crate) fn apply_connects(&mut self) {
        while let Some((mix, input)) = self.pending_connects.pop() {
            self.add_input(mix, input);
        }
    }

    pub(crate) fn apply_disconnects(&mut self) {
        while let Some((mix, input)) = self.pending_disconnects.pop() {
            self.remove_input(mix, input);
        }
    }
}

/// Renders node `id`, or returns `None` if it is inactive or missing.
pub(crate) fn render_node<T: Sample>(
    st: &mut RenderState<T>,
    id: NodeId,
    frames: usize,
    post: bool,
    needs_post: &mut bool,
) -> Option<BufferHandle> {
    let mut node = st.nodes.remove(id.0)?;
    let out = match &mut node {
        Node::Mix(mix) => mix.render(st, frames, post, needs_post),
        Node::Source(source) => source.render(st, id, frames, post, needs_post),
        Node::EffectBus(bus) => bus.render(st, frames, post, needs_post),
    };
    st.nodes.insert(id.0, node);
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cricket_core::EffectProcessor;

    use super::*;
    use crate::arena::{EffectId, IdAllocator};
    use crate::decoder::Decoder;
    use crate::format::{AudioFormat, SampleInfo};
    use crate::source::BufferSource;

    const FRAMES: usize = 64;

    struct Graph {
        st: RenderState<f32>,
        ids: IdAllocator,
        effect_ids: IdAllocator,
    }

    impl Graph {
        fn new() -> Self {
            let pool = BufferPool::new(8, FRAMES * 4);
            Self {
                st: RenderState::new(pool, 44100.0, 10.0, 1000.0),
                ids: IdAllocator::new(),
                effect_ids: IdAllocator::new(),
            }
        }

        fn insert(&mut self, mut node: Node<f32>) -> NodeId {
            let id = NodeId(self.ids.allocate());
            node.attach(&mut self.st.pool);
            self.st.nodes.insert(id.0, node);
            id
        }

        fn mix(&mut self) -> NodeId {
            self.insert(Node::Mix(MixNode::new(vec![0.0; FRAMES * 4])))
        }

        fn bus(&mut self) -> NodeId {
            let input = MixNode::new(vec![0.0; FRAMES * 4]);
            self.insert(Node::EffectBus(Box::new(EffectBusNode::new(input))))
        }

        /// Stereo PCM16 source playing `pcm` into `output`.
        fn source(&mut self, pcm: &[i16], output: NodeId) -> NodeId {
            let bytes = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
            let info = SampleInfo::new(AudioFormat::PcmI16, 2, 44100, pcm.len() / 2);
            let src = BufferSource::from_bytes(bytes, info);
            let mut node = SourceNode::new(Box::new(src), output, Arc::new(SourceStatus::default()));
            node.apply(SourceCommand::SetDecoder(Box::new(Decoder::new(&info, FRAMES * 2))));
            let id = self.insert(Node::Source(Box::new(node)));
            self.source_cmd(id, SourceCommand::SetPlaying(1));
            self.source_cmd(id, SourceCommand::Connect);
            id
        }

        fn source_cmd(&mut self, id: NodeId, cmd: SourceCommand) {
            let Some(Node::Source(node)) = self.st.nodes.get_mut(id.0) else {
                panic!("not a source");
            };
            match node.apply(cmd) {
                source::Routing::Attach(mix) => self.st.add_input(mix, id),
                source::Routing::Detach(mix) => self.st.remove_input(mix, id),
                source::Routing::Move { from, to } => {
                    self.st.remove_input(from, id);
                    self.st.add_input(to, id);
                }
                source::Routing::Stay => {}
            }
        }

        fn effect(&mut self, processor: Box<dyn EffectProcessor>) -> EffectId {
            let id = EffectId(self.effect_ids.allocate());
            self.st.effects.insert(id.0, EffectSlot::new(processor));
            id
        }

        fn bus_cmd(&mut self, id: NodeId, cmd: BusCommand) {
            let Some(Node::EffectBus(bus)) = self.st.nodes.get_mut(id.0) else {
                panic!("not a bus");
            };
            bus.apply(id, cmd, &mut self.st.effects);
        }

        fn render(&mut self, root: NodeId, frames: usize) -> Option<Vec<f32>> {
            let mut post = false;
            let handle = render_node(&mut self.st, root, frames, false, &mut post)?;
            self.st.apply_connects();
            while post {
                post = false;
                if let Some(extra) = render_node(&mut self.st, root, frames, true, &mut post) {
                    let (src, dst) = self.st.pool.pair_mut(extra, handle);
                    cricket_core::mix::mix(&src[..frames * 2], &mut dst[..frames * 2]);
                    self.st.pool.release(extra);
                }
                self.st.apply_connects();
            }
            let out = self.st.pool.get(handle)[..frames * 2].to_vec();
            self.st.pool.release(handle);
            self.st.apply_disconnects();
            Some(out)
        }
    }

    fn ramp(frames: usize) -> Vec<i16> {
        (0..frames * 2).map(|i| (i as i16 + 1) * 100).collect()
    }

    struct Halve;

    impl EffectProcessor for Halve {
        fn set_param(&mut self, _id: u32, _value: f32) {}
        fn reset(&mut self) {}
        fn process_fixed(&mut self, buf: &mut [i32]) {
            buf.iter_mut().for_each(|s| *s /= 2);
        }
        fn process_float(&mut self, buf: &mut [f32]) {
            buf.iter_mut().for_each(|s| *s *= 0.5);
        }
    }

    #[test]
    fn empty_mix_is_inactive() {
        let mut g = Graph::new();
        let mix = g.mix();
        assert!(g.render(mix, FRAMES).is_none());
        assert_eq!(g.st.pool.in_use(), 0);
    }

    #[test]
    fn silent_inputs_leave_the_signal_unchanged() {
        let mut g = Graph::new();
        let mix = g.mix();
        let pcm = ramp(FRAMES);
        g.source(&vec![0; FRAMES * 2], mix);
        g.source(&pcm, mix);
        g.source(&vec![0; FRAMES * 2], mix);

        let out = g.render(mix, FRAMES).unwrap();
        for (o, p) in out.iter().zip(&pcm) {
            assert_eq!(*o, f32::from_i16(*p));
        }
        assert_eq!(g.st.pool.in_use(), 0);
    }

    #[test]
    fn finished_source_disconnects_and_zero_fills() {
        let mut g = Graph::new();
        let mix = g.mix();
        let pcm = ramp(10);
        let src = g.source(&pcm, mix);

        let out = g.render(mix, FRAMES).unwrap();
        assert_eq!(out[19], f32::from_i16(pcm[19]));
        assert!(out[20..].iter().all(|s| *s == 0.0));

        let Some(Node::Mix(m)) = g.st.nodes.get(mix.0) else { panic!() };
        assert!(m.inputs().is_empty());
        let Some(Node::Source(s)) = g.st.nodes.get(src.0) else { panic!() };
        assert_eq!(s.status().done_id(), 1);
        assert_eq!(s.status().play_id(), 0);
    }

    #[test]
    fn next_source_continues_in_the_same_quantum() {
        let mut g = Graph::new();
        let mix = g.mix();
        let first = g.source(&vec![1000; 20], mix);
        let second_pcm = vec![2000i16; FRAMES * 2];
        let second = g.source(&second_pcm, mix);
        g.source_cmd(second, SourceCommand::Disconnect);
        g.source_cmd(second, SourceCommand::SetPlaying(0));
        g.source_cmd(first, SourceCommand::SetNext(Some(second)));

        let out = g.render(mix, FRAMES).unwrap();
        assert_eq!(out[0], f32::from_i16(1000));
        assert_eq!(out[19], f32::from_i16(1000));
        assert_eq!(out[20], f32::from_i16(2000));
        assert_eq!(out[FRAMES * 2 - 1], f32::from_i16(2000));

        let Some(Node::Source(s)) = g.st.nodes.get(second.0) else { panic!() };
        assert_eq!(s.status().play_id(), -1);
        assert!(s.is_connected());
    }

    #[test]
    fn effect_bus_at_zero_wet_matches_bypass() {
        let pcm = ramp(FRAMES);
        let render = |configure: &dyn Fn(&mut Graph, NodeId, EffectId)| {
            let mut g = Graph::new();
            let bus = g.bus();
            g.source(&pcm, bus);
            let fx = g.effect(Box::new(Halve));
            g.bus_cmd(bus, BusCommand::AddEffect(fx));
            configure(&mut g, bus, fx);
            g.render(bus, FRAMES).unwrap()
        };

        let bypassed = render(&|g, bus, _| g.bus_cmd(bus, BusCommand::SetBypassed(true)));
        let dry = render(&|g, bus, _| g.bus_cmd(bus, BusCommand::SetWetDry(0.0)));
        let wet = render(&|_, _, _| {});
        assert_eq!(bypassed, dry);
        assert_eq!(wet[5], dry[5] * 0.5);
    }

    #[test]
    fn half_wet_effect_crossfades_with_equal_power() {
        let mut g = Graph::new();
        let bus = g.bus();
        let pcm = vec![16384i16; FRAMES * 2];
        g.source(&pcm, bus);
        let fx = g.effect(Box::new(Halve));
        g.bus_cmd(bus, BusCommand::AddEffect(fx));
        g.st.effects.get_mut(fx.0).unwrap().wet_dry = 0.5;

        let out = g.render(bus, FRAMES).unwrap();
        let x = f32::from_i16(16384);
        let (wet, dry) = cricket_core::equal_power_gains(0.5);
        assert!((out[0] - (x * 0.5 * wet + x * dry)).abs() < 1e-6);
        assert_eq!(g.st.pool.in_use(), 0);
    }

    #[test]
    fn moving_an_effect_between_buses_updates_both() {
        let mut g = Graph::new();
        let a = g.bus();
        let b = g.bus();
        let fx = g.effect(Box::new(Halve));
        g.bus_cmd(a, BusCommand::AddEffect(fx));
        let Some(Node::EffectBus(bus_b)) = g.st.nodes.get_mut(b.0) else { panic!() };
        let moved = bus_b.apply(b, BusCommand::AddEffect(fx), &mut g.st.effects);
        assert_eq!(moved, Some((a, fx)));
        assert_eq!(g.st.effects.get(fx.0).unwrap().owner, Some(b));
    }
}
