use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use tracing::debug;

use backend::{BackendConfig, PixelFormat};

use crate::selector;

/// Raw handles plus the initial size of the window the client presents
/// into. The event loop that owns the window lives outside this crate;
/// the handles must stay valid for the configured lifetime.
#[derive(Clone, Copy, Debug)]
pub struct WindowTarget {
    pub raw_display_handle: RawDisplayHandle,
    pub raw_window_handle: RawWindowHandle,
    pub width: u32,
    pub height: u32,
}

impl WindowTarget {
    pub fn from_window<T>(window: &T, width: u32, height: u32) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
        let handle = window
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        Ok(Self {
            raw_display_handle: display.as_raw(),
            raw_window_handle: handle.as_raw(),
            width,
            height,
        })
    }
}

/// Logical GPU context for one configuration: the surface, the selected
/// adapter's device and queue, and the negotiated surface parameters.
/// Owned exclusively by one backend instance; released at deconfigure.
pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: wgpu::Limits,
    pub surface_format: wgpu::TextureFormat,
    pub present_mode: wgpu::PresentMode,
    pub alpha_mode: wgpu::CompositeAlphaMode,
    pub latency_frames: u32,
}

impl GpuContext {
    pub(crate) fn new(
        instance: &wgpu::Instance,
        target: &WindowTarget,
        pixel_format: PixelFormat,
        config: &BackendConfig,
    ) -> Result<Self> {
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: target.raw_display_handle,
                raw_window_handle: target.raw_window_handle,
            })
        }
        .context("failed to create presentation surface")?;

        // BackendError passes through anyhow intact so the caller can
        // recover the NoDevice/Fatal distinction by downcast.
        let adapter = selector::select_adapter(instance, &surface, config)?;
        let limits = adapter.limits();

        let caps = surface.get_capabilities(&adapter);
        let surface_format = pick_surface_format(&caps.formats, pixel_format)
            .context("surface offers no compatible pixel format")?;
        let present_mode = selector::choose_present_mode(&caps.present_modes, config);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("framerelay device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let latency_frames = config.clamped_latency();
        debug!(
            ?surface_format,
            ?present_mode,
            latency_frames,
            "created GPU context"
        );

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            limits,
            surface_format,
            present_mode,
            alpha_mode,
            latency_frames,
        })
    }

    /// Blocks until all submitted work has drained. Used before chain
    /// teardown so nothing in flight references freed objects.
    pub(crate) fn wait_idle(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("device wait-idle failed: {err:?}"))?;
        Ok(())
    }
}

/// Surface format matching the relayed pixel layout. Non-sRGB variants
/// keep the blit byte-exact; sRGB views would re-encode the bytes.
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
    pixel_format: PixelFormat,
) -> Option<wgpu::TextureFormat> {
    let wanted = match pixel_format {
        PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        // No packed 24-bit GPU format; the descriptor excludes it.
        PixelFormat::Rgb8 => return None,
    };
    if formats.contains(&wanted) {
        return Some(wanted);
    }
    // Any non-sRGB 8-bit format still works for the blit path since the
    // shader samples and rewrites each texel.
    formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| formats.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_the_exact_match() {
        let formats = [
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            pick_surface_format(&formats, PixelFormat::Bgra8),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
    }

    #[test]
    fn surface_format_falls_back_to_any_non_srgb() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8Unorm,
        ];
        assert_eq!(
            pick_surface_format(&formats, PixelFormat::Bgra8),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );
    }

    #[test]
    fn packed_rgb_has_no_gpu_surface_format() {
        let formats = [wgpu::TextureFormat::Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats, PixelFormat::Rgb8), None);
    }
}
