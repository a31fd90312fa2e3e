use serde::{Deserialize, Serialize};

/// Pixel layouts the relay understands end to end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32-bit blue/green/red/alpha, the native layout of most
    /// desktop-duplication sources.
    Bgra8,
    /// 32-bit red/green/blue/alpha.
    Rgba8,
    /// Packed 24-bit red/green/blue, CPU paths only.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Compression applied to captured frame bytes before they enter the
/// transport. The transport sizes its shared buffer for the
/// uncompressed worst case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameCompression {
    None,
    Rle,
}

/// Geometry and byte layout of one frame as it crosses the transport
/// boundary.
///
/// `stride` counts pixels per row including padding; `pitch` counts
/// bytes per row including padding. A frame occupies `height * pitch`
/// bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFormat {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pitch: u32,
}

impl FrameFormat {
    /// A layout with no row padding.
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            stride: width,
            pitch: width * format.bytes_per_pixel(),
        }
    }

    /// Total bytes one frame occupies, padding included.
    pub fn frame_bytes(&self) -> usize {
        self.height as usize * self.pitch as usize
    }

    /// Bytes of actual pixel data per row, padding excluded.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel() as usize
    }
}

/// A transient frame descriptor plus externally-owned pixel bytes.
///
/// The backend never keeps the bytes past one upload call; it copies or
/// schedules a copy immediately.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub format: FrameFormat,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// One row of pixel data, padding excluded. `None` when the row
    /// index or the backing slice is out of range.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.format.height {
            return None;
        }
        let start = y as usize * self.format.pitch as usize;
        let end = start + self.format.row_bytes();
        self.data.get(start..end)
    }
}

/// An owned frame for handing across threads; the loop side borrows it
/// back as a [`Frame`].
#[derive(Clone, Debug)]
pub struct OwnedFrame {
    pub format: FrameFormat,
    pub data: Vec<u8>,
}

impl OwnedFrame {
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            format: self.format,
            data: &self.data,
        }
    }
}

/// Cursor image delivered by a pointer-shape event. Small enough to
/// copy; backends either keep the latest one or decline the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorShape {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub hot_x: u32,
    pub hot_y: u32,
    pub data: Vec<u8>,
}

/// Pointer visibility and position at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerState {
    pub visible: bool,
    pub x: i32,
    pub y: i32,
}

/// Destination rectangle in output coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
