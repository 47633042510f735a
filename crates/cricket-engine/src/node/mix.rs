//! Summing node.

use cricket_core::Sample;

use super::{RenderState, render_node};
use crate::arena::NodeId;
use crate::pool::{BufferHandle, BufferPool};

/// Sums its active inputs.
///
/// Inputs render in list order and new inputs go to the front. The first
/// input that produces a buffer becomes the accumulator; every later one is
/// added into it and released. Each mix node grows the buffer pool by one
/// buffer for as long as it is in the graph.
pub struct MixNode<T> {
    inputs: Vec<NodeId>,
    reserve: Vec<T>,
    slot: Option<usize>,
}

impl<T: Sample> MixNode<T> {
    /// Mix node carrying its pool buffer, allocated by the caller.
    pub(crate) fn new(reserve: Vec<T>) -> Self {
        Self {
            inputs: Vec::with_capacity(8),
            reserve,
            slot: None,
        }
    }

    /// Inputs in render order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Adds `input` at the front unless it is already present.
    pub(crate) fn add_input(&mut self, input: NodeId) {
        if !self.inputs.contains(&input) {
            self.inputs.insert(0, input);
        }
    }

    /// Removes `input` if present.
    pub(crate) fn remove_input(&mut self, input: NodeId) {
        self.inputs.retain(|&i| i != input);
    }

    /// Moves the reserved buffer into the pool.
    pub(crate) fn attach(&mut self, pool: &mut BufferPool<T>) {
        if self.slot.is_none() {
            self.slot = Some(pool.adopt(std::mem::take(&mut self.reserve)));
        }
    }

    /// Takes the node's buffer back out of the pool, to be freed with the
    /// node.
    pub(crate) fn detach(&mut self, pool: &mut BufferPool<T>) {
        if let Some(slot) = self.slot.take() {
            self.reserve = pool.retire(slot);
        }
    }

    pub(crate) fn render(
        &self,
        st: &mut RenderState<T>,
        frames: usize,
        post: bool,
        needs_post: &mut bool,
    ) -> Option<BufferHandle> {
        let mut inputs = self.inputs.iter();
        let mut acc = None;
        for &input in inputs.by_ref() {
            if let Some(handle) = render_node(st, input, frames, post, needs_post) {
                acc = Some(handle);
                break;
            }
        }
        let acc = acc?;

        if st.budget.exceeded() {
            return Some(acc);
        }

        let n = frames * 2;
        for &input in inputs {
            let Some(handle) = render_node(st, input, frames, post, needs_post) else {
                continue;
            };
            if st.budget.exceeded() {
                st.pool.release(handle);
                break;
            }
            let (src, dst) = st.pool.pair_mut(handle, acc);
            cricket_core::mix::mix(&src[..n], &mut dst[..n]);
            st.pool.release(handle);
        }
        Some(acc)
    }
}
