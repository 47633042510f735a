//! Block-level audio sources.
//!
//! A source hands out raw encoded blocks; a [`Decoder`](crate::decoder::Decoder)
//! turns them into samples. Sources own the looping logic, so a decoder can
//! read straight through a loop boundary without knowing it exists.
//!
//! | Source | Backing | Ready |
//! |--------|---------|-------|
//! | [`BufferSource`] | bank sample in memory | immediately |
//! | [`StreamSource`] | ring buffer refilled from a file thread | once primed |
//! | [`SineSource`] | generated PCM16 tone | immediately |

pub mod buffer;
pub mod sine;
pub mod stream;

pub use buffer::BufferSource;
pub use sine::SineSource;
pub use stream::{StreamSource, StreamSourceReader, StreamUpdater};

use crate::format::SampleInfo;

/// Encoded block provider driven by a source node on the audio thread.
///
/// Loop bounds are in frames; `loop_end < 0` means the end of the sound.
/// A negative loop count loops forever.
pub trait AudioSource: Send {
    /// Whether the format is known.
    fn is_inited(&self) -> bool;

    /// Whether data can be read without underrunning.
    fn is_ready(&self) -> bool;

    /// Whether the source can never produce data.
    fn is_failed(&self) -> bool;

    /// Format of the data, once inited.
    fn sample_info(&self) -> Option<SampleInfo>;

    /// Reads up to `blocks` blocks into `buf`. Returns the blocks read.
    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize;

    /// Next block to be read.
    fn block_pos(&self) -> usize;

    /// Moves the read position.
    fn set_block_pos(&mut self, block: usize);

    /// Total blocks, if known.
    fn num_blocks(&self) -> Option<usize>;

    /// Sets the loop region in frames.
    fn set_loop(&mut self, start: i32, end: i32);

    /// Current loop region in frames.
    fn loop_bounds(&self) -> (i32, i32);

    /// Sets how many times the loop region repeats.
    fn set_loop_count(&mut self, count: i32);

    /// Loop repeat count.
    fn loop_count(&self) -> i32;

    /// Loop repetitions completed so far.
    fn current_loop(&self) -> i32;

    /// Lets playback continue past the loop end.
    fn release_loop(&mut self);

    /// Whether [`release_loop`](Self::release_loop) was called since the last reset.
    fn is_loop_released(&self) -> bool;

    /// Whether every block has been read.
    fn is_done(&self) -> bool;

    /// Rewinds to the start and clears loop progress.
    fn reset(&mut self);
}

/// Loop start rounded to a block, kept inside `[0, end_block)`.
pub(crate) fn loop_start_block(start_frame: i32, block_frames: u16, end_block: usize) -> usize {
    let block = (f64::from(start_frame.max(0)) / f64::from(block_frames.max(1))).round() as usize;
    block.min(end_block.saturating_sub(1))
}
