//! Reference-counted scratch buffers for the render graph.
//!
//! Every node renders into a buffer borrowed from one [`BufferPool`]. The pool
//! is sized once, before rendering starts, so the audio thread never
//! allocates. Handles are `index + generation`: a buffer becomes acquirable
//! again exactly when its last reference is released, and the generation
//! bump makes any handle kept past that point detectably stale.
//!
//! Each buffer holds `2 channels × max render frames × 2` samples; the extra
//! factor leaves room for sources decoding ahead of a speed-up.

/// Handle to a pooled buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

impl BufferHandle {
    /// Slot index inside the pool.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation the handle was issued for.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    data: Vec<T>,
    refs: u32,
    generation: u32,
    retired: bool,
}

impl<T: Copy + Default> Slot<T> {
    fn new(len: usize) -> Self {
        Self {
            data: vec![T::default(); len],
            refs: 0,
            generation: 0,
            retired: false,
        }
    }
}

/// Fixed set of equal-size scratch buffers.
pub struct BufferPool<T> {
    slots: Vec<Slot<T>>,
    buffer_len: usize,
}

impl<T: Copy + Default> BufferPool<T> {
    /// Pre-allocates `count` buffers of `buffer_len` samples each.
    pub fn new(count: usize, buffer_len: usize) -> Self {
        Self::with_reserve(count, buffer_len, 0)
    }

    /// Like [`new`](Self::new), with room in the slot table for `reserve`
    /// [`adopt`](Self::adopt)ed buffers so adopting them never reallocates.
    pub fn with_reserve(count: usize, buffer_len: usize, reserve: usize) -> Self {
        let mut slots = Vec::with_capacity(count + reserve);
        slots.extend((0..count).map(|_| Slot::new(buffer_len)));
        Self { slots, buffer_len }
    }

    /// Slots the table holds before it has to reallocate.
    pub fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Samples per buffer.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Buffers available for acquisition (busy or not).
    pub fn capacity(&self) -> usize {
        self.slots.iter().filter(|s| !s.retired).count()
    }

    /// Buffers currently referenced.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.refs > 0).count()
    }

    /// Takes a free buffer with one reference.
    ///
    /// # Panics
    ///
    /// Panics when every buffer is busy. The pool is sized for the deepest
    /// graph, so exhaustion means the topology bookkeeping is broken.
    pub fn acquire(&mut self) -> BufferHandle {
        let Some(index) = self.slots.iter().position(|s| !s.retired && s.refs == 0) else {
            panic!("buffer pool exhausted ({} buffers busy)", self.in_use());
        };
        let slot = &mut self.slots[index];
        slot.refs = 1;
        BufferHandle {
            index: index as u32,
            generation: slot.generation,
        }
    }

    /// Adds a reference to a live buffer and returns an aliasing handle.
    pub fn share(&mut self, handle: BufferHandle) -> BufferHandle {
        let slot = self.live_slot_mut(handle);
        slot.refs += 1;
        handle
    }

    /// Drops one reference. The buffer returns to the pool when the count
    /// reaches zero; stale handles are ignored.
    pub fn release(&mut self, handle: BufferHandle) {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return;
        };
        if slot.generation != handle.generation || slot.refs == 0 {
            return;
        }
        slot.refs -= 1;
        if slot.refs == 0 {
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    /// Reference count of the buffer, or 0 for a stale handle.
    pub fn refs(&self, handle: BufferHandle) -> u32 {
        self.slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation)
            .map_or(0, |s| s.refs)
    }

    /// Whether `handle` still refers to a held buffer.
    pub fn is_live(&self, handle: BufferHandle) -> bool {
        self.refs(handle) > 0
    }

    /// Read access to a held buffer.
    pub fn get(&self, handle: BufferHandle) -> &[T] {
        let slot = &self.slots[handle.index()];
        assert!(
            slot.generation == handle.generation && slot.refs > 0,
            "stale buffer handle {handle:?}"
        );
        &slot.data
    }

    /// Write access to a held buffer.
    pub fn get_mut(&mut self, handle: BufferHandle) -> &mut [T] {
        &mut self.live_slot_mut(handle).data
    }

    /// Reads `src` while writing `dst`. The handles must name different
    /// buffers.
    pub fn pair_mut(&mut self, src: BufferHandle, dst: BufferHandle) -> (&[T], &mut [T]) {
        assert_ne!(src.index, dst.index, "source and destination alias one buffer");
        for h in [src, dst] {
            let slot = &self.slots[h.index()];
            assert!(slot.generation == h.generation && slot.refs > 0, "stale buffer handle {h:?}");
        }
        let (a, b) = (src.index(), dst.index());
        if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            (&lo[a].data, &mut hi[0].data)
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            (&hi[0].data, &mut lo[b].data)
        }
    }

    /// Registers one long-lived buffer owned by a node, growing the pool.
    /// Returns the slot number to pass to [`retire`](Self::retire).
    ///
    /// The memory is allocated by the caller, so the audio thread only moves
    /// it in. A previously retired, idle slot is refilled before the slot
    /// table grows.
    pub fn adopt(&mut self, mut data: Vec<T>) -> usize {
        data.resize(self.buffer_len, T::default());
        if let Some(index) = self.slots.iter().position(|s| s.retired && s.refs == 0) {
            let slot = &mut self.slots[index];
            slot.retired = false;
            slot.data = data;
            return index;
        }
        if self.slots.len() == self.slots.capacity() {
            tracing::warn!(slots = self.slots.len(), "buffer pool slot table full; growing");
        }
        self.slots.push(Slot {
            data,
            refs: 0,
            generation: 0,
            retired: false,
        });
        self.slots.len() - 1
    }

    /// Removes a slot registered with [`adopt`](Self::adopt) from circulation
    /// and hands its memory back for disposal off the audio thread.
    pub fn retire(&mut self, slot: usize) -> Vec<T> {
        match self.slots.get_mut(slot) {
            Some(s) => {
                s.retired = true;
                std::mem::take(&mut s.data)
            }
            None => Vec::new(),
        }
    }

    fn live_slot_mut(&mut self, handle: BufferHandle) -> &mut Slot<T> {
        let slot = &mut self.slots[handle.index()];
        assert!(
            slot.generation == handle.generation && slot.refs > 0,
            "stale buffer handle {handle:?}"
        );
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_never_returns_busy_buffer() {
        let mut pool = BufferPool::<f32>::new(3, 16);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        assert_ne!(a.index(), b.index());
        assert_ne!(b.index(), c.index());
        assert_ne!(a.index(), c.index());
        assert_eq!(pool.in_use(), 3);
    }

    #[test]
    fn reuse_only_after_last_release() {
        let mut pool = BufferPool::<i32>::new(1, 4);
        let a = pool.acquire();
        let alias = pool.share(a);
        assert_eq!(pool.refs(a), 2);

        pool.release(a);
        assert_eq!(pool.refs(alias), 1);
        assert!(pool.is_live(alias));

        pool.release(alias);
        assert!(!pool.is_live(a));

        let b = pool.acquire();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
    }

    #[test]
    fn stale_release_is_ignored() {
        let mut pool = BufferPool::<f32>::new(1, 4);
        let a = pool.acquire();
        pool.release(a);
        let b = pool.acquire();
        pool.release(a);
        assert_eq!(pool.refs(b), 1);
    }

    #[test]
    #[should_panic]
    fn exhaustion_panics() {
        let mut pool = BufferPool::<f32>::new(1, 4);
        let _a = pool.acquire();
        let _b = pool.acquire();
    }

    #[test]
    fn pair_mut_splits_either_order() {
        let mut pool = BufferPool::<f32>::new(2, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.get_mut(a).copy_from_slice(&[1.0, 2.0]);
        {
            let (src, dst) = pool.pair_mut(a, b);
            dst.copy_from_slice(src);
        }
        let (src, dst) = pool.pair_mut(b, a);
        dst[0] = src[1] * 10.0;
        assert_eq!(pool.get(a), &[20.0, 2.0]);
    }

    #[test]
    fn adopt_grows_and_retire_shrinks() {
        let mut pool = BufferPool::<f32>::new(2, 8);
        let slot = pool.adopt(vec![0.0; 8]);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.retire(slot).len(), 8);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.adopt(Vec::with_capacity(8)), slot);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn adopting_within_reserve_keeps_slot_table() {
        let mut pool = BufferPool::<f32>::with_reserve(2, 8, 4);
        let table = pool.slot_capacity();
        assert!(table >= 6);
        let slots: Vec<usize> = (0..4).map(|_| pool.adopt(vec![0.0; 8])).collect();
        assert_eq!(slots, vec![2, 3, 4, 5]);
        assert_eq!(pool.capacity(), 6);
        assert_eq!(pool.slot_capacity(), table);
    }
}
