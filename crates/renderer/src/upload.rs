//! Frame upload pipeline: CPU-writable staging buffer plus its
//! GPU-resident image.

use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use backend::{BackendError, Frame, FrameFormat, PixelFormat};

/// Upper bound on the synchronous map/transfer waits. Blowing through
/// it means the device is wedged, which is a per-frame error, not a
/// hang.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows in the staging buffer are padded to this boundary for
/// buffer-to-texture copies.
pub(crate) fn padded_pitch(row_bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    row_bytes.div_ceil(align) * align
}

pub(crate) fn texture_format(pixel_format: PixelFormat) -> Result<wgpu::TextureFormat> {
    match pixel_format {
        PixelFormat::Bgra8 => Ok(wgpu::TextureFormat::Bgra8Unorm),
        PixelFormat::Rgba8 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::Rgb8 => Err(anyhow!("packed 24-bit frames have no GPU texture format")),
    }
}

/// Fixed-size staging buffer and its GPU-resident counterpart image.
///
/// Exactly one pair is alive per configured backend. It is not part of
/// the resource chain (it survives resize) but is tied to the frame
/// format: a format change rebuilds it, and its byte size never changes
/// without recreation.
pub(crate) struct StagingImage {
    buffer: wgpu::Buffer,
    texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Tight bytes of pixel data per row.
    row_bytes: u32,
    /// Destination row length in the buffer; fixed at creation, never
    /// recomputed per upload.
    pitch: u32,
}

impl StagingImage {
    pub(crate) fn new(device: &wgpu::Device, format: FrameFormat) -> Result<Self> {
        let texel_format = texture_format(format.format)?;
        let row_bytes = format.row_bytes() as u32;
        let pitch = padded_pitch(row_bytes);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame staging buffer"),
            size: pitch as u64 * format.height as u64,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame staging image"),
            size: wgpu::Extent3d {
                width: format.width,
                height: format.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texel_format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            buffer,
            texture,
            view,
            width: format.width,
            height: format.height,
            format: format.format,
            row_bytes,
            pitch,
        })
    }

    /// Copies the frame into the staging buffer row by row, then runs a
    /// one-shot transfer into the staging image and waits for it within
    /// a bounded window. Keeping the transfer synchronous bounds
    /// latency and guarantees at most one upload in flight.
    ///
    /// On failure the staging image keeps its previous contents, which
    /// the chain will simply re-present.
    pub(crate) fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &Frame<'_>,
    ) -> Result<(), BackendError> {
        if frame.format.width != self.width
            || frame.format.height != self.height
            || frame.format.format != self.format
        {
            return Err(BackendError::frame(format!(
                "frame {}x{} {:?} does not match staging image {}x{} {:?}",
                frame.format.width,
                frame.format.height,
                frame.format.format,
                self.width,
                self.height,
                self.format,
            )));
        }

        self.write_rows(device, frame)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame upload encoder"),
        });
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.pitch),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        // Bounded wait for this single transfer; the transient command
        // resources die with the encoder.
        let (done_tx, done_rx) = mpsc::channel();
        queue.on_submitted_work_done(move || {
            let _ = done_tx.send(());
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| BackendError::frame(format!("upload wait failed: {err:?}")))?;
        done_rx
            .recv_timeout(TRANSFER_TIMEOUT)
            .map_err(|_| BackendError::frame("frame transfer did not complete in time"))?;

        Ok(())
    }

    /// Maps the persistent buffer and performs the width/height/pitch
    /// matched copy. Destination row length comes from the staging
    /// layout, never from the incoming frame.
    fn write_rows(&self, device: &wgpu::Device, frame: &Frame<'_>) -> Result<(), BackendError> {
        let slice = self.buffer.slice(..);
        let (map_tx, map_rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Write, move |result| {
            let _ = map_tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| BackendError::frame(format!("staging map wait failed: {err:?}")))?;
        map_rx
            .recv_timeout(TRANSFER_TIMEOUT)
            .map_err(|_| BackendError::frame("staging map did not complete in time"))?
            .map_err(|err| BackendError::frame(format!("staging map failed: {err:?}")))?;

        {
            let mut mapped = slice.get_mapped_range_mut();
            let row_bytes = self.row_bytes as usize;
            let pitch = self.pitch as usize;
            for y in 0..self.height {
                let source = frame.row(y).ok_or_else(|| {
                    BackendError::frame(format!("frame buffer truncated at row {y}"))
                })?;
                let offset = y as usize * pitch;
                mapped[offset..offset + row_bytes].copy_from_slice(source);
            }
        }
        self.buffer.unmap();
        Ok(())
    }
}
