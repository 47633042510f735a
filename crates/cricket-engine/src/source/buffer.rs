//! In-memory sample source.

use std::ops::Range;
use std::sync::Arc;

use super::{AudioSource, loop_start_block};
use crate::format::SampleInfo;

/// Plays one sample out of a shared memory region, typically a loaded bank.
///
/// Looping is block-granular: the loop start rounds to the nearest block and
/// a loop end of -1 means the last block. A loop shorter than one block is
/// widened to one block.
pub struct BufferSource {
    data: Arc<Vec<u8>>,
    range: Range<usize>,
    info: SampleInfo,
    pos: usize,
    loop_start: i32,
    loop_end: i32,
    loop_count: i32,
    loop_current: i32,
    released: bool,
}

impl BufferSource {
    /// Source over `data[range]`, which must hold `info.data_bytes()` bytes.
    pub fn new(data: Arc<Vec<u8>>, range: Range<usize>, info: SampleInfo) -> Self {
        debug_assert_eq!(range.len(), info.data_bytes());
        Self {
            data,
            range,
            info,
            pos: 0,
            loop_start: info.loop_start as i32,
            loop_end: info.loop_end,
            loop_count: i32::from(info.loop_count),
            loop_current: 0,
            released: false,
        }
    }

    /// Source owning `bytes` outright.
    pub fn from_bytes(bytes: Vec<u8>, info: SampleInfo) -> Self {
        let range = 0..bytes.len();
        Self::new(Arc::new(bytes), range, info)
    }

    fn is_looping(&self) -> bool {
        !self.released && (self.loop_count < 0 || self.loop_current < self.loop_count)
    }

    fn len(&self) -> usize {
        self.range.len()
    }

    fn copy_out(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len() - self.pos);
        let start = self.range.start + self.pos;
        out[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n;
        n
    }
}

impl AudioSource for BufferSource {
    fn is_inited(&self) -> bool {
        true
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn sample_info(&self) -> Option<SampleInfo> {
        Some(self.info)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize) -> usize {
        let bb = usize::from(self.info.block_bytes);
        if bb == 0 {
            return 0;
        }
        let want = (blocks * bb).min(buf.len() / bb * bb);
        let end_block = self.len() / bb;
        let mut done = 0;

        if self.is_looping() && end_block > 0 {
            let bf = self.info.block_frames;
            let start_block = loop_start_block(self.loop_start, bf, end_block);
            let mut end = if self.loop_end < 0 {
                end_block
            } else {
                ((f64::from(self.loop_end) / f64::from(bf)).round() as usize).clamp(1, end_block)
            };
            if end <= start_block {
                end = start_block + 1;
            }
            let end_byte = end * bb;

            while done < want {
                let n = (want - done).min(end_byte.saturating_sub(self.pos));
                done += self.copy_out(&mut buf[done..done + n]);
                if self.pos >= end_byte {
                    self.pos = start_block * bb;
                    self.loop_current += 1;
                }
                if self.loop_count >= 0 && self.loop_current >= self.loop_count {
                    break;
                }
            }
        }

        // After the final repetition the read continues straight through, so
        // the last pass joins the loop without a gap.
        if done < want {
            done += self.copy_out(&mut buf[done..want]);
        }
        done / bb
    }

    fn block_pos(&self) -> usize {
        self.pos / usize::from(self.info.block_bytes.max(1))
    }

    fn set_block_pos(&mut self, block: usize) {
        self.pos = (block * usize::from(self.info.block_bytes)).min(self.len());
    }

    fn num_blocks(&self) -> Option<usize> {
        Some(self.len() / usize::from(self.info.block_bytes.max(1)))
    }

    fn set_loop(&mut self, start: i32, end: i32) {
        self.loop_start = start;
        self.loop_end = end;
    }

    fn loop_bounds(&self) -> (i32, i32) {
        (self.loop_start, self.loop_end)
    }

    fn set_loop_count(&mut self, count: i32) {
        self.loop_count = count;
    }

    fn loop_count(&self) -> i32 {
        self.loop_count
    }

    fn current_loop(&self) -> i32 {
        self.loop_current
    }

    fn release_loop(&mut self) {
        self.released = true;
    }

    fn is_loop_released(&self) -> bool {
        self.released
    }

    fn is_done(&self) -> bool {
        !self.is_looping() && self.pos >= self.len()
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.loop_current = 0;
        self.released = false;
    }
}
