//! The display source seam: one trait per capturable output.

use std::time::Duration;

use backend::{CursorShape, DeviceClass, FrameFormat, PixelFormat, PointerState};
use thiserror::Error;

/// Failures a source reports from acquisition and frame waits. The
/// capture backend maps these onto its own failure taxonomy; sources
/// never see the lifecycle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The capture session is gone (output reconfigured, session
    /// revoked). The source must be released and re-acquired before the
    /// next frame wait.
    #[error("capture session invalidated")]
    Invalidated,

    /// No frame arrived within the bounded wait.
    #[error("no frame within {0:?}")]
    Timeout(Duration),

    /// Anything else; the session itself is still usable.
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Static description of one capturable output, gathered during
/// enumeration and refreshed on re-acquisition.
#[derive(Clone, Debug)]
pub struct SourceDescriptor {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub class: DeviceClass,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl SourceDescriptor {
    /// Uncompressed bytes of one full frame from this output.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.format.bytes_per_pixel() as usize
    }
}

/// One captured frame, borrowed from the source until the next call on
/// it. The backend copies it out immediately.
#[derive(Debug)]
pub struct SourceFrame<'a> {
    pub format: FrameFormat,
    pub data: &'a [u8],
    /// Pointer position delivered with this frame, when the platform
    /// reports it in-band.
    pub pointer: Option<PointerState>,
}

/// A capturable display output.
///
/// Call order is enforced by the capture backend: `describe` at any
/// time, `acquire` before the first `next_frame`, `release` before
/// dropping an acquired source. After [`SourceError::Invalidated`] the
/// source must be re-acquired.
pub trait DisplaySource: Send {
    fn describe(&self) -> SourceDescriptor;

    /// Opens the capture session. Idempotent on an already-acquired
    /// source.
    fn acquire(&mut self) -> Result<(), SourceError>;

    /// Closes the capture session. Best effort.
    fn release(&mut self);

    /// Blocks up to `timeout` for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> Result<SourceFrame<'_>, SourceError>;

    /// Latest cursor image, when one changed since the last call.
    fn cursor_shape(&mut self) -> Option<CursorShape>;
}
