//! Bounded byte ring used to buffer streamed audio.
//!
//! The ring itself is single-threaded; the streaming source wraps it in a
//! mutex so the audio thread (reader) and file thread (writer) agree on the
//! stored byte count.

/// Fixed-capacity byte FIFO.
#[derive(Debug, Default)]
pub struct RingBuffer {
    data: Vec<u8>,
    read: usize,
    write: usize,
    stored: usize,
}

impl RingBuffer {
    /// Creates a ring holding up to `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            read: 0,
            write: 0,
            stored: 0,
        }
    }

    /// Whether storage has been allocated.
    pub fn is_inited(&self) -> bool {
        !self.data.is_empty()
    }

    /// Capacity in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes available to read.
    pub fn stored(&self) -> usize {
        self.stored
    }

    /// Bytes available to write.
    pub fn free(&self) -> usize {
        self.data.len() - self.stored
    }

    /// Copies out up to `out.len()` bytes. Returns the count.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.stored);
        let first = n.min(self.data.len() - self.read);
        out[..first].copy_from_slice(&self.data[self.read..self.read + first]);
        out[first..n].copy_from_slice(&self.data[..n - first]);
        self.advance_read(n);
        n
    }

    /// Copies in up to `input.len()` bytes. Returns the count.
    pub fn write(&mut self, input: &[u8]) -> usize {
        let n = input.len().min(self.free());
        let first = n.min(self.data.len() - self.write);
        self.data[self.write..self.write + first].copy_from_slice(&input[..first]);
        self.data[..n - first].copy_from_slice(&input[first..n]);
        if !self.data.is_empty() {
            self.write = (self.write + n) % self.data.len();
        }
        self.stored += n;
        n
    }

    /// Discards up to `n` stored bytes. Returns the count.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.stored);
        self.advance_read(n);
        n
    }

    /// Drops everything stored by rewinding the writer to the reader.
    pub fn reset_write(&mut self) {
        self.write = self.read;
        self.stored = 0;
    }

    /// Drops everything stored by advancing the reader to the writer.
    pub fn reset_read(&mut self) {
        self.read = self.write;
        self.stored = 0;
    }

    fn advance_read(&mut self, n: usize) {
        if !self.data.is_empty() {
            self.read = (self.read + n) % self.data.len();
        }
        self.stored -= n;
    }
}
