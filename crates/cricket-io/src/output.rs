//! cpal output driver.
//!
//! The cpal callback thread is the audio thread: every callback renders the
//! graph through a [`RenderHandle`] and converts the stereo result to the
//! device's f32 channel layout.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig};
use cricket_core::Sample;
use cricket_engine::{AudioGraph, GraphOutput, RenderHandle};

use crate::device::{device_name, find_output_device};
use crate::{Error, Result};

/// Largest number of frames rendered per graph call inside one callback.
const MAX_CALLBACK_FRAMES: usize = 4096;

/// Plays a graph on an output device.
///
/// The device stream is opened by [`start`](GraphOutput::start) and closed by
/// [`stop`](GraphOutput::stop) or drop. While it runs, the graph's commands
/// are drained by the callback thread.
pub struct CpalOutput<T: Sample> {
    handle: RenderHandle<T>,
    device_name: Option<String>,
    buffer_frames: u32,
    stream: Option<Stream>,
}

impl<T: Sample> CpalOutput<T> {
    /// Output for `graph` on the default device, asking for one render
    /// quantum per callback.
    pub fn new(graph: &AudioGraph<T>) -> Self {
        Self {
            handle: graph.render_handle(),
            device_name: None,
            buffer_frames: graph.config().frames_per_update().max(1) as u32,
            stream: None,
        }
    }

    /// Uses the first device whose name contains `name`.
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Requested device name filter.
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    fn build(&self, device: &Device, config: &StreamConfig) -> Result<Stream> {
        let handle = self.handle.clone();
        let channels = usize::from(config.channels.max(1));
        let mut scratch = vec![T::ZERO; MAX_CALLBACK_FRAMES * 2];

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let mut done = 0;
                    while done < frames {
                        let n = (frames - done).min(MAX_CALLBACK_FRAMES);
                        let stereo = &mut scratch[..n * 2];
                        handle.render(stereo);
                        let dst = &mut data[done * channels..(done + n) * channels];
                        write_frames(stereo, dst, channels);
                        done += n;
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "output stream error");
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))
    }
}

/// Spreads interleaved stereo frames over a device layout of `channels`.
fn write_frames<T: Sample>(stereo: &[T], out: &mut [f32], channels: usize) {
    for (frame, dst) in stereo.chunks_exact(2).zip(out.chunks_exact_mut(channels)) {
        let (l, r) = (frame[0].to_f32(), frame[1].to_f32());
        if channels == 1 {
            dst[0] = 0.5 * (l + r);
        } else {
            dst[0] = l;
            dst[1] = r;
            dst[2..].fill(0.0);
        }
    }
}

impl<T: Sample> GraphOutput for CpalOutput<T> {
    type Error = Error;

    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let host = cpal::default_host();
        let device = find_output_device(&host, self.device_name.as_deref())?;
        let channels = device
            .default_output_config()
            .map(|c| c.channels().min(2))
            .unwrap_or(2);
        let mut config = StreamConfig {
            channels,
            sample_rate: self.handle.sample_rate(),
            buffer_size: BufferSize::Fixed(self.buffer_frames),
        };

        let stream = match self.build(&device, &config) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, frames = self.buffer_frames, "fixed buffer size rejected; using device default");
                config.buffer_size = BufferSize::Default;
                self.build(&device, &config)?
            }
        };

        // The callback owns draining from the first buffer on.
        self.handle.set_running(true);
        if let Err(e) = stream.play() {
            self.handle.set_running(false);
            return Err(Error::Stream(e.to_string()));
        }
        tracing::info!(
            device = %device_name(&device).unwrap_or_default(),
            channels,
            sample_rate = self.handle.sample_rate(),
            "output stream started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!(error = %e, "output stream could not be paused before closing");
            }
            drop(stream);
            self.handle.set_running(false);
            tracing::info!("output stream stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

impl<T: Sample> Drop for CpalOutput<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: Sample> std::fmt::Debug for CpalOutput<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutput")
            .field("device_name", &self.device_name)
            .field("buffer_frames", &self.buffer_frames)
            .field("running", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cricket_engine::EngineConfig;

    #[test]
    fn stereo_frames_map_onto_device_layouts() {
        let stereo = [0.5f32, -0.5, 0.25, 0.75];

        let mut mono = [9.0f32; 2];
        write_frames(&stereo, &mut mono, 1);
        assert_eq!(mono, [0.0, 0.5]);

        let mut quad = [9.0f32; 8];
        write_frames(&stereo, &mut quad, 4);
        assert_eq!(quad, [0.5, -0.5, 0.0, 0.0, 0.25, 0.75, 0.0, 0.0]);
    }

    #[test]
    fn fixed_point_samples_convert_to_float() {
        let stereo = [1i32 << 23, -(1i32 << 23)];
        let mut out = [0.0f32; 2];
        write_frames(&stereo, &mut out, 2);
        assert_eq!(out, [0.5, -0.5]);
    }

    #[test]
    fn new_output_is_stopped() {
        let graph = AudioGraph::<f32>::new(&EngineConfig::default());
        let output = CpalOutput::new(&graph).with_device("speakers");
        assert!(!output.is_running());
        assert_eq!(output.device_name(), Some("speakers"));
        assert!(!graph.is_running());
    }
}
