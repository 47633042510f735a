//! Output seam between the graph and whatever consumes its frames.
//!
//! A device backend owns a [`RenderHandle`] and pulls interleaved stereo
//! frames from its own callback thread. [`ManualOutput`] pulls on the
//! caller's thread, which is what offline rendering and tests want.

use std::convert::Infallible;

use cricket_core::Sample;

use crate::graph::{AudioGraph, RenderHandle};

/// A consumer of rendered frames that can be started and stopped.
///
/// While an output is running the graph leaves command draining to the
/// render thread; while stopped, [`AudioGraph::update`] drains them.
pub trait GraphOutput {
    /// Start/stop failure.
    type Error;

    /// Starts pulling frames.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Stops pulling frames.
    fn stop(&mut self);

    /// Whether frames are being pulled.
    fn is_running(&self) -> bool;
}

/// Renders on demand into an owned buffer.
pub struct ManualOutput<T: Sample> {
    handle: RenderHandle<T>,
    buffer: Vec<T>,
    running: bool,
}

impl<T: Sample> ManualOutput<T> {
    /// Output for `graph`, stopped.
    pub fn new(graph: &AudioGraph<T>) -> Self {
        Self {
            handle: graph.render_handle(),
            buffer: Vec::new(),
            running: false,
        }
    }

    /// Renders `frames` stereo frames and returns them interleaved.
    pub fn render(&mut self, frames: usize) -> &[T] {
        self.buffer.resize(frames * 2, T::ZERO);
        self.handle.render(&mut self.buffer);
        &self.buffer
    }

    /// Renders into a caller buffer of interleaved stereo frames.
    pub fn render_into(&mut self, out: &mut [T]) {
        self.handle.render(out);
    }

    /// Graph sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.handle.sample_rate()
    }
}

impl<T: Sample> GraphOutput for ManualOutput<T> {
    type Error = Infallible;

    fn start(&mut self) -> Result<(), Infallible> {
        self.running = true;
        self.handle.set_running(true);
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.handle.set_running(false);
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl<T: Sample> Drop for ManualOutput<T> {
    fn drop(&mut self) {
        if self.running {
            self.handle.set_running(false);
        }
    }
}

impl<T: Sample> std::fmt::Debug for ManualOutput<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualOutput")
            .field("frames", &(self.buffer.len() / 2))
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
