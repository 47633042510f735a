//! Effect processor trait.
//!
//! An [`EffectProcessor`] transforms interleaved stereo buffers in one of the
//! two sample representations. Processors are created on the control thread
//! and then moved to the audio thread, which is the only place their process
//! and parameter methods run.
//!
//! ## Design Decisions
//!
//! - **Two entry points**: the fixed and float paths are separate methods so a
//!   processor can keep its integer math exact instead of round-tripping
//!   through float.
//! - **In place by default**: effect buses skip an output buffer for
//!   processors that report [`EffectProcessor::is_in_place`].
//! - **Integer parameter ids**: parameters are addressed by `u32` so custom
//!   processors can be driven through the same command path as built-ins.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

/// Audio-thread effect processor.
///
/// # Example
///
/// ```rust
/// use cricket_core::EffectProcessor;
///
/// struct Invert;
///
/// impl EffectProcessor for Invert {
///     fn set_param(&mut self, _id: u32, _value: f32) {}
///     fn reset(&mut self) {}
///     fn process_fixed(&mut self, buf: &mut [i32]) {
///         buf.iter_mut().for_each(|s| *s = -*s);
///     }
///     fn process_float(&mut self, buf: &mut [f32]) {
///         buf.iter_mut().for_each(|s| *s = -*s);
///     }
/// }
///
/// let mut fx = Invert;
/// let mut buf = [0.5f32, -0.25];
/// fx.process_float(&mut buf);
/// assert_eq!(buf, [-0.5, 0.25]);
/// ```
pub trait EffectProcessor: Send {
    /// Sets parameter `id` to `value`. Unknown ids are ignored.
    fn set_param(&mut self, id: u32, value: f32);

    /// Clears internal state without touching parameters.
    fn reset(&mut self);

    /// Informs the processor of the graph sample rate.
    ///
    /// Called once before the processor first runs.
    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    /// Whether the processor writes its result into its input buffer.
    fn is_in_place(&self) -> bool {
        true
    }

    /// Processes interleaved 8.24 stereo frames in place.
    fn process_fixed(&mut self, buf: &mut [i32]);

    /// Processes interleaved float stereo frames in place.
    fn process_float(&mut self, buf: &mut [f32]);

    /// Processes `input` into `output` (fixed point).
    ///
    /// Default copies and processes in place. Override alongside
    /// `is_in_place() == false`.
    fn process_fixed_to(&mut self, input: &[i32], output: &mut [i32]) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.process_fixed(&mut output[..n]);
    }

    /// Processes `input` into `output` (float).
    fn process_float_to(&mut self, input: &[f32], output: &mut [f32]) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.process_float(&mut output[..n]);
    }
}

impl<P: EffectProcessor + ?Sized> EffectProcessor for Box<P> {
    fn set_param(&mut self, id: u32, value: f32) {
        (**self).set_param(id, value);
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        (**self).set_sample_rate(sample_rate);
    }

    fn is_in_place(&self) -> bool {
        (**self).is_in_place()
    }

    fn process_fixed(&mut self, buf: &mut [i32]) {
        (**self).process_fixed(buf);
    }

    fn process_float(&mut self, buf: &mut [f32]) {
        (**self).process_float(buf);
    }

    fn process_fixed_to(&mut self, input: &[i32], output: &mut [i32]) {
        (**self).process_fixed_to(input, output);
    }

    fn process_float_to(&mut self, input: &[f32], output: &mut [f32]) {
        (**self).process_float_to(input, output);
    }
}
