// src/frame_schedule.rs

/// Assumed rate when a capture reports none (common for cameras).
pub const FALLBACK_FPS: f64 = 30.0;

/// Processes every n-th frame of a stream, starting with the first.
#[derive(Debug, Clone, Copy)]
pub struct FrameStride {
    stride: u64,
}

impl FrameStride {
    /// A stride of 0 is treated as 1.
    pub fn new(stride: u32) -> Self {
        Self {
            stride: stride.max(1) as u64,
        }
    }

    pub fn should_process(&self, frame_number: u64) -> bool {
        frame_number % self.stride == 0
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Playback rate for output that holds only the processed frames, so it
    /// keeps the source's real-time pace.
    pub fn output_fps(&self, source_fps: f64) -> f64 {
        let fps = if source_fps > 0.0 { source_fps } else { FALLBACK_FPS };
        fps / self.stride as f64
    }
}
