//! Streaming source: a ring buffer filled by a file thread, drained by the
//! audio thread.
//!
//! Two paths share one [`StreamSource`]:
//!
//! - **Fast path** (audio thread, through [`StreamSourceReader`]): copy blocks
//!   out of the ring, account for loop wraps, report underruns.
//! - **Slow path** ([`StreamSource::file_update`], called by a
//!   [`StreamUpdater`]): open the stream, size the ring, apply resets and
//!   seeks, refill once the ring drops below half full.
//!
//! The ring state sits behind a mutex held only for copies and counters. The
//! file read itself runs with that mutex released, so a slow disk never
//! blocks the audio thread. A seek that lands while a read is in flight
//! abandons the rest of that fill; the next update starts over from the new
//! position.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::{Mutex, MutexGuard};

use super::{AudioSource, loop_start_block};
use crate::format::SampleInfo;
use crate::ring::RingBuffer;
use crate::stream_file::AudioStream;

struct FileSide {
    stream: Box<dyn AudioStream>,
    scratch: Vec<u8>,
}

struct StreamState {
    info: Option<SampleInfo>,
    num_blocks: Option<usize>,
    ring: RingBuffer,
    inited: bool,
    failed: bool,
    primed: bool,
    reset: bool,
    warned: bool,
    play_block: usize,
    next_block: Option<usize>,
    loop_start: i32,
    loop_end: i32,
    loop_set: bool,
    loop_count: i32,
    loop_count_set: bool,
    read_loop: i32,
    play_loop: i32,
    read_done: bool,
    play_done: bool,
    released: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            info: None,
            num_blocks: None,
            ring: RingBuffer::default(),
            inited: false,
            failed: false,
            primed: false,
            reset: false,
            warned: false,
            play_block: 0,
            next_block: None,
            loop_start: 0,
            loop_end: -1,
            loop_set: false,
            loop_count: 0,
            loop_count_set: false,
            read_loop: 0,
            play_loop: 0,
            read_done: false,
            play_done: false,
            released: false,
        }
    }
}

impl StreamState {
    fn block_bytes(&self) -> usize {
        self.info.map_or(1, |i| usize::from(i.block_bytes.max(1)))
    }

    fn block_frames(&self) -> u16 {
        self.info.map_or(1, |i| i.block_frames.max(1))
    }
}

/// Shared state of one streamed sound.
pub struct StreamSource {
    file: Mutex<FileSide>,
    state: Mutex<StreamState>,
    buffer_ms: f32,
}

impl StreamSource {
    /// Streams `stream`, buffering `buffer_ms` of audio ahead.
    pub fn new(stream: Box<dyn AudioStream>, buffer_ms: f32) -> Arc<Self> {
        Arc::new(Self {
            file: Mutex::new(FileSide {
                stream,
                scratch: Vec::new(),
            }),
            state: Mutex::new(StreamState::default()),
            buffer_ms,
        })
    }

    /// Audio-thread view of this stream.
    pub fn reader(self: &Arc<Self>) -> StreamSourceReader {
        StreamSourceReader(Arc::clone(self))
    }

    /// Whether the format is known.
    pub fn is_inited(&self) -> bool {
        let st = self.state.lock();
        st.inited && !st.failed
    }

    /// Whether enough data is buffered to start playing.
    pub fn is_ready(&self) -> bool {
        let st = self.state.lock();
        st.inited && !st.failed && st.primed && !st.reset
    }

    /// Whether the stream could not be opened.
    pub fn is_failed(&self) -> bool {
        self.state.lock().failed
    }

    /// Format, once inited.
    pub fn sample_info(&self) -> Option<SampleInfo> {
        self.state.lock().info
    }

    /// Total blocks, once inited.
    pub fn num_blocks(&self) -> Option<usize> {
        self.state.lock().num_blocks
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.state.lock().ring.stored()
    }

    /// Slow path: opens the stream on first call, then keeps the ring topped
    /// up. Runs on the file thread; never call it from the audio thread.
    pub fn file_update(&self) {
        let mut file = self.file.lock();
        if !self.init(&mut file) {
            return;
        }

        let mut st = self.state.lock();
        if st.reset {
            st.ring.reset_write();
            st.reset = false;
            Self::apply_seek(&mut file, &mut st);
        }
        if !st.read_done && st.ring.is_inited() && st.ring.stored() < st.ring.size() / 2 {
            self.fill_buffer(&mut file, &mut st);
            if !st.reset {
                st.primed = true;
            }
        }
    }

    /// Returns whether the stream is usable.
    fn init(&self, file: &mut FileSide) -> bool {
        {
            let st = self.state.lock();
            if st.failed {
                return false;
            }
            if st.inited {
                return true;
            }
        }

        match file.stream.init() {
            Ok(info) => {
                let num_blocks = file.stream.num_blocks();
                let mut st = self.state.lock();
                let bb = usize::from(info.block_bytes.max(1));
                let bytes_per_sec =
                    f32::from(info.sample_rate) * bb as f32 / f32::from(info.block_frames.max(1));
                let mut size = (self.buffer_ms * 0.001 * bytes_per_sec).round() as usize;
                size -= size % bb;
                st.ring = RingBuffer::new(size.max(bb));
                if !st.loop_set {
                    st.loop_start = info.loop_start as i32;
                    st.loop_end = info.loop_end;
                }
                if !st.loop_count_set {
                    st.loop_count = i32::from(info.loop_count);
                }
                st.info = Some(info);
                st.num_blocks = num_blocks;
                st.inited = true;
                tracing::debug!(
                    format = info.format.name(),
                    channels = info.channels,
                    sample_rate = info.sample_rate,
                    ring_bytes = st.ring.size(),
                    "stream opened"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open stream");
                self.state.lock().failed = true;
                false
            }
        }
    }

    fn apply_seek(file: &mut FileSide, st: &mut StreamState) {
        if let Some(block) = st.next_block.take() {
            file.stream.set_block_pos(block);
            st.play_block = file.stream.block_pos();
        }
    }

    fn fill_buffer(&self, file: &mut FileSide, st: &mut MutexGuard<'_, StreamState>) {
        let bb = st.block_bytes();
        let free = st.ring.free() / bb * bb;

        if !st.released && (st.loop_count < 0 || st.read_loop < st.loop_count) {
            let bf = st.block_frames();
            let mut start = (f64::from(st.loop_start.max(0)) / f64::from(bf)).round() as i64;
            let mut end = if st.loop_end < 0 {
                -1
            } else {
                (f64::from(st.loop_end) / f64::from(bf)).round() as i64
            };
            if end >= 0 && end <= start {
                end = start + 1;
            }

            let mut total = 0;
            let mut empty_passes = 0;
            while total < free {
                let mut to_read = free - total;
                if end >= 0 {
                    let left = (end - file.stream.block_pos() as i64).max(0) as usize;
                    to_read = to_read.min(left * bb);
                }
                let read = Self::read_from_stream(file, st, to_read);
                if st.reset {
                    return;
                }
                total += read;

                let pos = file.stream.block_pos() as i64;
                if (end >= 0 && pos >= end) || read < to_read {
                    start = start.min(pos - 1).max(0);
                    file.stream.set_block_pos(start as usize);
                    st.read_loop += 1;
                }

                // an empty stream would otherwise wrap forever
                if read == 0 {
                    empty_passes += 1;
                    if empty_passes > 1 {
                        st.read_done = true;
                        break;
                    }
                } else {
                    empty_passes = 0;
                }

                if st.loop_count >= 0 {
                    if st.read_loop > st.loop_count && read < to_read {
                        st.read_done = true;
                    }
                    if st.read_loop >= st.loop_count {
                        break;
                    }
                }
            }
        } else {
            let read = Self::read_from_stream(file, st, free);
            if !st.reset && read < free {
                st.read_done = true;
            }
        }
    }

    /// Reads up to `bytes` from the stream into the ring with the state lock
    /// released for the file I/O. Returns bytes stored; nothing is stored if
    /// a reset arrived during the read.
    fn read_from_stream(
        file: &mut FileSide,
        st: &mut MutexGuard<'_, StreamState>,
        bytes: usize,
    ) -> usize {
        let bb = st.block_bytes();
        let n = bytes.min(st.ring.free()) / bb * bb;
        if n == 0 {
            return 0;
        }
        if file.scratch.len() < n {
            file.scratch.resize(n, 0);
        }
        let FileSide { stream, scratch } = file;
        let blocks = MutexGuard::unlocked(st, || stream.read(&mut scratch[..n], n / bb));
        if st.reset {
            return 0;
        }
        st.ring.write(&scratch[..blocks * bb])
    }
}

/// Audio-thread [`AudioSource`] over a shared [`StreamSource`].
pub struct StreamSourceReader(Arc<StreamSource>);

impl StreamSourceReader {
    /// The shared stream.
    pub fn shared(&self) -> &Arc<StreamSource> {
        &self.0
    }
}

impl AudioSource for StreamSourceReader {
    fn is_inited(&self) -> bool {
        self.0.is_inited()
    }

    fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    fn is_failed(&self) -> bool {
        self.0.is_failed()
    }

    fn sample_info(&self) -> Option<SampleInfo> {
        self.0.sample_info()
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
        let mut st = self.0.state.lock();
        if st.play_done || !st.inited || st.reset {
            return 0;
        }
        let bb = st.block_bytes();
        let want = (blocks * bb).min(buf.len() / bb * bb);
        let read = st.ring.read(&mut buf[..want]) / bb;
        st.play_block += read;

        if !st.released {
            let bf = usize::from(st.block_frames());
            let end = if st.loop_end < 0 {
                st.num_blocks.unwrap_or(0)
            } else {
                st.loop_end as usize / bf
            };
            if end > 0 {
                let start = loop_start_block(st.loop_start, bf as u16, end);
                while (st.loop_count < 0 || st.play_loop < st.loop_count) && st.play_block >= end {
                    st.play_block -= end - start;
                    st.play_loop += 1;
                }
            }
        }

        if read < blocks {
            if st.read_done {
                st.play_done = true;
                st.play_block = 0;
            } else if !st.warned {
                tracing::warn!(
                    requested = blocks,
                    read,
                    "Stream buffer underrun; try increasing stream_buffer_ms"
                );
                st.warned = true;
            }
        } else {
            st.warned = false;
        }
        read
    }

    fn block_pos(&self) -> usize {
        self.0.state.lock().play_block
    }

    fn set_block_pos(&mut self, block: usize) {
        let mut st = self.0.state.lock();
        let pos = st.play_block;
        if st.next_block == Some(block) || block == pos {
            return;
        }
        let bb = st.block_bytes();
        let stored_blocks = st.ring.stored() / bb;
        if st.primed && !st.reset && block > pos && stored_blocks > block - pos {
            // target is already buffered; skip ahead
            st.ring.consume((block - pos) * bb);
            st.play_block = block;
            if st.ring.stored() < st.ring.size() / 2 {
                st.primed = false;
            }
            return;
        }
        st.reset = true;
        st.primed = false;
        st.read_done = false;
        st.play_done = false;
        st.next_block = Some(block);
        st.play_block = block;
    }

    fn num_blocks(&self) -> Option<usize> {
        self.0.num_blocks()
    }

    fn set_loop(&mut self, start: i32, end: i32) {
        let mut st = self.0.state.lock();
        st.loop_start = start;
        st.loop_end = end;
        st.loop_set = true;
    }

    fn loop_bounds(&self) -> (i32, i32) {
        let st = self.0.state.lock();
        (st.loop_start, st.loop_end)
    }

    fn set_loop_count(&mut self, count: i32) {
        let mut st = self.0.state.lock();
        st.loop_count = count;
        st.loop_count_set = true;
    }

    fn loop_count(&self) -> i32 {
        self.0.state.lock().loop_count
    }

    fn current_loop(&self) -> i32 {
        self.0.state.lock().play_loop
    }

    fn release_loop(&mut self) {
        self.0.state.lock().released = true;
    }

    fn is_loop_released(&self) -> bool {
        self.0.state.lock().released
    }

    fn is_done(&self) -> bool {
        self.0.state.lock().play_done
    }

    fn reset(&mut self) {
        let mut st = self.0.state.lock();
        if !st.inited {
            return;
        }
        st.reset = true;
        st.primed = false;
        st.play_block = 0;
        st.next_block = Some(0);
        st.read_loop = 0;
        st.play_loop = 0;
        st.read_done = false;
        st.play_done = false;
        st.released = false;
    }
}

/// Keeps every registered stream buffered.
///
/// Either spawned with its own file thread, or driven by hand with
/// [`update_all`](Self::update_all) (offline rendering, tests).
pub struct StreamUpdater {
    streams: Arc<Mutex<Vec<Weak<StreamSource>>>>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamUpdater {
    /// Updater without a thread.
    pub fn manual() -> Self {
        Self {
            streams: Arc::new(Mutex::new(Vec::new())),
            stop: None,
            thread: None,
        }
    }

    /// Updater polling every `interval` on a dedicated thread.
    pub fn spawn(interval: Duration) -> Self {
        let mut updater = Self::manual();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let streams = Arc::clone(&updater.streams);
        let spawned = std::thread::Builder::new()
            .name("cricket-stream".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => update(&streams),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            });
        match spawned {
            Ok(handle) => {
                updater.stop = Some(stop_tx);
                updater.thread = Some(handle);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start stream thread; streams need manual updates");
            }
        }
        updater
    }

    /// Adds a stream; it is dropped from the list once its last handle goes.
    pub fn register(&self, stream: &Arc<StreamSource>) {
        self.streams.lock().push(Arc::downgrade(stream));
    }

    /// Runs one slow-path update of every live stream.
    pub fn update_all(&self) {
        update(&self.streams);
    }

    /// Live streams.
    pub fn len(&self) -> usize {
        let mut list = self.streams.lock();
        list.retain(|w| w.strong_count() > 0);
        list.len()
    }

    /// Whether no stream is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn update(streams: &Mutex<Vec<Weak<StreamSource>>>) {
    let live: Vec<Arc<StreamSource>> = {
        let mut list = streams.lock();
        list.retain(|w| w.strong_count() > 0);
        list.iter().filter_map(Weak::upgrade).collect()
    };
    for stream in live {
        stream.file_update();
    }
}

impl Drop for StreamUpdater {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;
    use crate::stream_file::MemoryStream;

    /// Mono PCM16 stream where frame `i` holds the value `i`.
    fn counting_stream(frames: usize, buffer_ms: f32) -> Arc<StreamSource> {
        let info = SampleInfo::new(AudioFormat::PcmI16, 1, 8000, frames);
        let data = (0..frames).flat_map(|i| (i as i16).to_le_bytes()).collect();
        StreamSource::new(Box::new(MemoryStream::new(info, data)), buffer_ms)
    }

    fn play_all(stream: &Arc<StreamSource>, chunk: usize) -> Vec<i16> {
        let mut reader = stream.reader();
        let mut buf = vec![0u8; chunk * 2];
        let mut out = Vec::new();
        for _ in 0..10_000 {
            stream.file_update();
            let n = reader.read(&mut buf, chunk);
            out.extend(
                buf[..n * 2]
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]])),
            );
            if reader.is_done() {
                break;
            }
        }
        out
    }

    #[test]
    fn primes_then_plays_through() {
        let stream = counting_stream(3000, 125.0);
        assert!(!stream.is_ready());
        stream.file_update();
        assert!(stream.is_ready());
        assert_eq!(stream.buffered_bytes(), 2000);

        let out = play_all(&stream, 100);
        assert_eq!(out, (0..3000).map(|i| i as i16).collect::<Vec<_>>());
    }

    #[test]
    fn finite_loop_through_ring() {
        let stream = counting_stream(3000, 125.0);
        let mut reader = stream.reader();
        reader.set_loop(1000, 2000);
        reader.set_loop_count(2);

        let out = play_all(&stream, 100);
        let expected: Vec<i16> = (0..2000)
            .chain(1000..2000)
            .chain(1000..3000)
            .map(|i| i as i16)
            .collect();
        assert_eq!(out.len(), expected.len());
        assert_eq!(out, expected);
        assert_eq!(reader.current_loop(), 2);
    }

    #[test]
    fn seek_inside_buffer_skips_ahead() {
        let stream = counting_stream(3000, 125.0);
        stream.file_update();
        let mut reader = stream.reader();
        reader.set_block_pos(10);
        assert!(stream.is_ready());

        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf, 1), 1);
        assert_eq!(i16::from_le_bytes(buf), 10);
    }

    #[test]
    fn seek_outside_buffer_refills() {
        let stream = counting_stream(3000, 125.0);
        stream.file_update();
        let mut reader = stream.reader();
        reader.set_block_pos(2500);
        assert!(!stream.is_ready());
        assert_eq!(reader.block_pos(), 2500);

        stream.file_update();
        assert!(stream.is_ready());
        let mut buf = [0u8; 2];
        reader.read(&mut buf, 1);
        assert_eq!(i16::from_le_bytes(buf), 2500);
    }

    /// Stream that moves its own reader to `target` during the `fire_on`th
    /// file read, as a control thread seeking mid-fill would.
    struct SeekDuringRead {
        inner: MemoryStream,
        reads: usize,
        fire_on: usize,
        target: Arc<Mutex<Option<(StreamSourceReader, usize)>>>,
    }

    impl AudioStream for SeekDuringRead {
        fn init(&mut self) -> crate::Result<SampleInfo> {
            self.inner.init()
        }

        fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
            self.reads += 1;
            if self.reads == self.fire_on {
                if let Some((mut reader, block)) = self.target.lock().take() {
                    reader.set_block_pos(block);
                }
            }
            self.inner.read(buf, blocks)
        }

        fn num_blocks(&self) -> Option<usize> {
            self.inner.num_blocks()
        }

        fn set_block_pos(&mut self, block: usize) {
            self.inner.set_block_pos(block);
        }

        fn block_pos(&self) -> usize {
            self.inner.block_pos()
        }
    }

    #[test]
    fn seek_during_fill_is_not_lost() {
        let frames = 1200;
        let info = SampleInfo::new(AudioFormat::PcmI16, 1, 8000, frames);
        let data = (0..frames).flat_map(|i| (i as i16).to_le_bytes()).collect();
        let target = Arc::new(Mutex::new(None));
        let stream = StreamSource::new(
            Box::new(SeekDuringRead {
                inner: MemoryStream::new(info, data),
                reads: 0,
                fire_on: 2,
                target: Arc::clone(&target),
            }),
            125.0,
        );
        let mut reader = stream.reader();
        reader.set_loop_count(-1);

        stream.file_update();
        assert!(stream.is_ready());
        let mut buf = vec![0u8; 600 * 2];
        assert_eq!(reader.read(&mut buf, 600), 600);

        // the refill's read moves playback back to block 100
        *target.lock() = Some((stream.reader(), 100));
        stream.file_update();
        assert!(target.lock().is_none());
        assert!(!stream.is_ready());
        assert_eq!(reader.read(&mut buf, 1), 0);

        stream.file_update();
        assert!(stream.is_ready());
        assert_eq!(reader.block_pos(), 100);
        assert_eq!(reader.read(&mut buf[..2], 1), 1);
        assert_eq!(i16::from_le_bytes([buf[0], buf[1]]), 100);
    }

    #[test]
    fn invalid_stream_fails() {
        let mut info = SampleInfo::new(AudioFormat::PcmI16, 1, 8000, 4);
        info.channels = 3;
        let stream = StreamSource::new(Box::new(MemoryStream::new(info, vec![0; 8])), 100.0);
        stream.file_update();
        assert!(stream.is_failed());
        assert!(!stream.is_ready());
    }

    #[test]
    fn updater_drops_dead_streams() {
        let updater = StreamUpdater::manual();
        let a = counting_stream(10, 100.0);
        let b = counting_stream(10, 100.0);
        updater.register(&a);
        updater.register(&b);
        updater.update_all();
        assert!(a.is_ready() && b.is_ready());

        drop(b);
        assert_eq!(updater.len(), 1);
    }
}
