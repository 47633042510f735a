//! Cross-thread command queue.
//!
//! Any number of control threads produce; the audio thread consumes. Both
//! sides take the same short-lived mutex. The backing ring never drops a
//! command: when it is full it doubles in size, copying the live window in
//! FIFO order. The first growth logs a warning about the initial capacity;
//! later ones are silent.

use parking_lot::Mutex;

struct Ring<C> {
    slots: Vec<Option<C>>,
    read: usize,
    len: usize,
    warned: bool,
}

impl<C> Ring<C> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            read: 0,
            len: 0,
            warned: false,
        }
    }

    /// Doubles the ring. Returns true the first time only.
    fn grow(&mut self) -> bool {
        let capacity = self.slots.len();
        let mut slots: Vec<Option<C>> = (0..capacity * 2).map(|_| None).collect();
        for (i, slot) in slots.iter_mut().take(self.len).enumerate() {
            *slot = self.slots[(self.read + i) % capacity].take();
        }
        self.slots = slots;
        self.read = 0;
        !std::mem::replace(&mut self.warned, true)
    }
}

/// Mutex-serialized FIFO that grows instead of dropping.
pub struct CommandQueue<C> {
    ring: Mutex<Ring<C>>,
}

impl<C> CommandQueue<C> {
    /// Creates a queue holding `capacity` commands before it must grow.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity)),
        }
    }

    /// Appends a command. Returns true if the queue had to grow.
    pub fn produce(&self, cmd: C) -> bool {
        let mut ring = self.ring.lock();
        let mut grew = false;
        if ring.len == ring.slots.len() {
            grew = true;
            if ring.grow() {
                tracing::warn!(
                    capacity = ring.slots.len(),
                    "reallocating audio command queue; consider increasing max_audio_tasks"
                );
            }
        }
        let write = (ring.read + ring.len) % ring.slots.len();
        ring.slots[write] = Some(cmd);
        ring.len += 1;
        grew
    }

    /// Removes the oldest command.
    pub fn consume(&self) -> Option<C> {
        let mut ring = self.ring.lock();
        if ring.len == 0 {
            return None;
        }
        let read = ring.read;
        let cmd = ring.slots[read].take();
        ring.read = (read + 1) % ring.slots.len();
        ring.len -= 1;
        cmd
    }

    /// Commands waiting.
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commands that fit before the next growth.
    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len()
    }
}
