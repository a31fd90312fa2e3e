//! Synthetic display source.
//!
//! Renders an animated gradient on the CPU, so the whole capture path
//! can run headless. Tests script session invalidation through
//! [`PatternSource::invalidate_after`] to exercise re-acquisition.

use std::time::Duration;

use backend::{CursorShape, DeviceClass, FrameFormat, PixelFormat, PointerState};

use crate::source::{DisplaySource, SourceDescriptor, SourceError, SourceFrame};

pub struct PatternSource {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    acquired: bool,
    frame_index: u64,
    /// Frame index at which the session invalidates itself once.
    invalidate_after: Option<u64>,
    cursor_sent: bool,
    buffer: Vec<u8>,
}

impl PatternSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        let format = PixelFormat::Bgra8;
        Self {
            name: name.into(),
            width,
            height,
            format,
            acquired: false,
            frame_index: 0,
            invalidate_after: None,
            cursor_sent: false,
            buffer: vec![0; (width * height * format.bytes_per_pixel()) as usize],
        }
    }

    /// Schedules a one-shot session invalidation once `frames` frames
    /// have been delivered.
    pub fn invalidate_after(mut self, frames: u64) -> Self {
        self.invalidate_after = Some(frames);
        self
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frame_index
    }

    fn render(&mut self) {
        let bpp = self.format.bytes_per_pixel() as usize;
        let phase = (self.frame_index & 0xFF) as u32;
        for y in 0..self.height {
            for x in 0..self.width {
                let offset = (y * self.width + x) as usize * bpp;
                self.buffer[offset] = ((x + phase) & 0xFF) as u8;
                self.buffer[offset + 1] = ((y + phase) & 0xFF) as u8;
                self.buffer[offset + 2] = ((x + y) & 0xFF) as u8;
                self.buffer[offset + 3] = 0xFF;
            }
        }
    }
}

impl DisplaySource for PatternSource {
    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor {
            name: self.name.clone(),
            vendor_id: 0,
            device_id: 0,
            class: DeviceClass::Virtual,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    fn acquire(&mut self) -> Result<(), SourceError> {
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<SourceFrame<'_>, SourceError> {
        if !self.acquired {
            return Err(SourceError::Failed("source is not acquired".into()));
        }
        if self.invalidate_after.is_some_and(|after| self.frame_index >= after) {
            self.invalidate_after = None;
            self.acquired = false;
            return Err(SourceError::Invalidated);
        }

        self.render();
        self.frame_index += 1;
        let step = (self.frame_index % u64::from(self.width.max(1))) as i32;
        Ok(SourceFrame {
            format: FrameFormat::packed(self.format, self.width, self.height),
            data: &self.buffer,
            pointer: Some(PointerState {
                visible: true,
                x: step,
                y: step,
            }),
        })
    }

    fn cursor_shape(&mut self) -> Option<CursorShape> {
        if self.cursor_sent {
            return None;
        }
        self.cursor_sent = true;
        // 4x4 opaque white square, hotspot at the corner.
        Some(CursorShape {
            width: 4,
            height: 4,
            pitch: 16,
            hot_x: 0,
            hot_y: 0,
            data: vec![0xFF; 64],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_animate_between_calls() {
        let mut source = PatternSource::new("pattern", 16, 16);
        source.acquire().unwrap();
        let first = source.next_frame(Duration::ZERO).unwrap().data.to_vec();
        let second = source.next_frame(Duration::ZERO).unwrap().data.to_vec();
        assert_ne!(first, second);
    }

    #[test]
    fn scripted_invalidation_fires_once_and_needs_reacquire() {
        let mut source = PatternSource::new("pattern", 8, 8).invalidate_after(2);
        source.acquire().unwrap();
        source.next_frame(Duration::ZERO).unwrap();
        source.next_frame(Duration::ZERO).unwrap();
        assert!(matches!(
            source.next_frame(Duration::ZERO),
            Err(SourceError::Invalidated)
        ));
        // Without re-acquisition the source refuses to deliver.
        assert!(matches!(
            source.next_frame(Duration::ZERO),
            Err(SourceError::Failed(_))
        ));
        source.acquire().unwrap();
        source.next_frame(Duration::ZERO).unwrap();
    }

    #[test]
    fn cursor_shape_is_delivered_once() {
        let mut source = PatternSource::new("pattern", 8, 8);
        assert!(source.cursor_shape().is_some());
        assert!(source.cursor_shape().is_none());
    }
}
