//! Capture boundary: where frames come from.

use std::collections::VecDeque;

use gazecal_core::{Frame, GrayImage};

/// A frame owned by its source.
#[derive(Clone, Debug)]
pub struct OwnedFrame {
    pub image: GrayImage,
    pub timestamp: f64,
    pub index: u64,
}

impl OwnedFrame {
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            image: self.image.view(),
            timestamp: self.timestamp,
            index: self.index,
        }
    }
}

/// Delivers frames one at a time.
pub trait FrameSource {
    /// Whether a capture device is attached. Sessions refuse to start otherwise.
    fn is_available(&self) -> bool;

    fn next_frame(&mut self) -> Option<OwnedFrame>;
}

/// Frames queued in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryFrameSource {
    frames: VecDeque<OwnedFrame>,
}

impl MemoryFrameSource {
    pub fn new(frames: impl IntoIterator<Item = OwnedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` copies of `image` at `fps`.
    pub fn repeat(image: &GrayImage, count: usize, fps: f64) -> Self {
        Self::new((0..count).map(|i| OwnedFrame {
            image: image.clone(),
            timestamp: i as f64 / fps,
            index: i as u64,
        }))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemoryFrameSource {
    fn is_available(&self) -> bool {
        !self.frames.is_empty()
    }

    fn next_frame(&mut self) -> Option<OwnedFrame> {
        self.frames.pop_front()
    }
}
