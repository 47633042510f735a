//! Generational ids and the slot arenas they index.
//!
//! The control thread hands out ids from an [`IdAllocator`]; the audio thread
//! stores the objects in [`Slots`] under the same id. A released id bumps its
//! slot generation, so commands still in flight for a destroyed object are
//! recognized and dropped instead of reaching whatever reuses the index.

/// Index plus generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// Slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation the id was issued with.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Handle to a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) SlotId);

/// Handle to an effect processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectId(pub(crate) SlotId);

/// Control-side id bookkeeping.
#[derive(Debug, Default)]
pub struct IdAllocator {
    generations: Vec<u32>,
    live: Vec<bool>,
    free: Vec<u32>,
}

impl IdAllocator {
    /// Empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues an id, reusing a released index when one is available.
    pub fn allocate(&mut self) -> SlotId {
        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            self.generations.push(0);
            self.live.push(false);
            (self.generations.len() - 1) as u32
        };
        self.live[index as usize] = true;
        SlotId {
            index,
            generation: self.generations[index as usize],
        }
    }

    /// Retires `id`. Returns false if it was already released.
    pub fn release(&mut self, id: SlotId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        let i = id.index();
        self.live[i] = false;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free.push(id.index);
        true
    }

    /// Whether `id` is current.
    pub fn is_live(&self, id: SlotId) -> bool {
        let i = id.index();
        i < self.live.len() && self.live[i] && self.generations[i] == id.generation
    }

    /// Ids currently live.
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    /// Highest index ever issued, plus one.
    pub fn high_water(&self) -> usize {
        self.generations.len()
    }
}

struct Slot<N> {
    generation: u32,
    value: Option<N>,
}

/// Audio-side storage indexed by [`SlotId`].
pub struct Slots<N> {
    slots: Vec<Slot<N>>,
}

impl<N> Slots<N> {
    /// Storage with room for `capacity` slots before it reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Stores `value` under `id`. A value for an id older than the slot's
    /// current generation is handed back.
    pub fn insert(&mut self, id: SlotId, value: N) -> Option<N> {
        let i = id.index();
        while self.slots.len() <= i {
            self.slots.push(Slot {
                generation: 0,
                value: None,
            });
        }
        let slot = &mut self.slots[i];
        if id.generation < slot.generation {
            return Some(value);
        }
        slot.generation = id.generation;
        slot.value = Some(value);
        None
    }

    /// Removes and returns the value under `id`.
    pub fn remove(&mut self, id: SlotId) -> Option<N> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.take()
    }

    /// Value under `id`.
    pub fn get(&self, id: SlotId) -> Option<&N> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    /// Mutable value under `id`.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut N> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Whether a value is stored under `id`.
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Stored values with their ids.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut N)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| {
                (
                    SlotId {
                        index: i as u32,
                        generation,
                    },
                    v,
                )
            })
        })
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
