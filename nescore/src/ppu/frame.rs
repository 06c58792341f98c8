use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Receives the PPU's output, one pixel per visible tick
pub trait PixelSink {
    /// `colour_index` is an NES palette index (0-63)
    fn put_pixel(&mut self, x: usize, y: usize, colour_index: u8);

    /// Called at the start of the post-render scanline, once every pixel of the frame is out
    fn frame_complete(&mut self) {}
}

/// Buffers a whole frame of palette indices
#[derive(Clone)]
pub struct FrameBuffer {
    pixels: Vec<u8>,
    frames: u64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            frames: 0,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * DISPLAY_WIDTH + x]
    }

    /// Number of frames completed so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

impl PixelSink for FrameBuffer {
    fn put_pixel(&mut self, x: usize, y: usize, colour_index: u8) {
        if x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT {
            self.pixels[y * DISPLAY_WIDTH + x] = colour_index;
        }
    }

    fn frame_complete(&mut self) {
        self.frames += 1;
    }
}
