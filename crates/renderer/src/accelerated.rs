//! Accelerated render backend on wgpu.

use std::time::{Duration, Instant};

use backend::{
    BackendConfig, BackendDescriptor, BackendError, BackendKind, BackendOps, BackendResult,
    CursorShape, Frame, FrameFormat, PixelFormat, PointerState, TransientKind,
};
use tracing::{debug, warn};

use crate::chain::SurfaceChain;
use crate::context::{GpuContext, WindowTarget};
use crate::upload::StagingImage;

pub const WGPU_RENDER_BACKEND: BackendDescriptor = BackendDescriptor {
    name: "wgpu",
    kind: BackendKind::Render,
    formats: &[PixelFormat::Bgra8, PixelFormat::Rgba8],
    needs_surface: true,
};

/// Acquire latency above this gets a warning; at 60 Hz anything slower
/// already missed the tick.
const FRAME_BUDGET: Duration = Duration::from_millis(17);

/// Everything alive between configure and deconfigure. Field order is
/// reverse creation order so the implicit drop tears down chain before
/// staging before context.
struct Gpu {
    retired: Option<SurfaceChain>,
    chain: SurfaceChain,
    staging: StagingImage,
    format: FrameFormat,
    /// The last present reported a suboptimal surface; rebuild at the
    /// start of the next iteration.
    refresh_pending: bool,
    context: GpuContext,
}

/// Uploads relayed frames into a GPU staging image and blits them to
/// the window surface.
pub struct WgpuRenderBackend {
    instance: Option<wgpu::Instance>,
    config: BackendConfig,
    gpu: Option<Gpu>,
    next_generation: u64,
}

impl WgpuRenderBackend {
    pub fn new() -> Self {
        Self {
            instance: None,
            config: BackendConfig::default(),
            gpu: None,
            next_generation: 0,
        }
    }

    fn gpu(&self) -> BackendResult<&Gpu> {
        self.gpu
            .as_ref()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    fn gpu_mut(&mut self) -> BackendResult<&mut Gpu> {
        self.gpu
            .as_mut()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    fn take_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}

impl Default for WgpuRenderBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_surface_error(err: wgpu::SurfaceError) -> BackendError {
    match err {
        wgpu::SurfaceError::Timeout => BackendError::Transient(TransientKind::AcquireTimeout),
        wgpu::SurfaceError::Outdated => BackendError::Transient(TransientKind::SurfaceOutdated),
        wgpu::SurfaceError::Lost => BackendError::Transient(TransientKind::SurfaceLost),
        wgpu::SurfaceError::OutOfMemory => {
            BackendError::fatal("surface acquisition ran out of memory")
        }
        other => BackendError::frame(format!("surface acquisition failed: {other:?}")),
    }
}

impl BackendOps for WgpuRenderBackend {
    type Target = WindowTarget;

    fn name(&self) -> &'static str {
        WGPU_RENDER_BACKEND.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Render
    }

    fn setup(&mut self, config: &BackendConfig) -> BackendResult<()> {
        self.config = config.clone();
        self.instance = Some(wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        }));
        Ok(())
    }

    /// Selector → logical context → staging image → chain. The staging
    /// image precedes the chain because the chain's bind group samples
    /// it; both still roll back through drop on any failure.
    fn activate(&mut self, target: WindowTarget, format: FrameFormat) -> BackendResult<()> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| BackendError::fatal("activate called before setup"))?;

        let context = GpuContext::new(instance, &target, format.format, &self.config)
            .map_err(|err| match err.downcast::<BackendError>() {
                Ok(backend_err) => backend_err,
                Err(other) => BackendError::Fatal(format!("{other:#}")),
            })?;
        let staging = StagingImage::new(&context.device, format)
            .map_err(|err| BackendError::Fatal(format!("{err:#}")))?;
        let generation = self.take_generation();
        let chain = SurfaceChain::create(&context, &staging, target.width, target.height, generation)
            .map_err(|err| BackendError::Fatal(format!("{err:#}")))?;

        self.gpu = Some(Gpu {
            retired: None,
            chain,
            staging,
            format,
            refresh_pending: false,
            context,
        });
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            // Nothing may be freed while referenced by unfinished work.
            if let Err(err) = gpu.context.wait_idle() {
                warn!(error = %err, "device did not drain cleanly during deconfigure");
            }
            // Drop order: retired chain, chain, staging, context.
        }
    }

    fn teardown(&mut self) {
        self.instance = None;
    }

    fn chain_extent(&self) -> Option<(u32, u32)> {
        self.gpu.as_ref().map(|gpu| gpu.chain.extent)
    }

    fn rebuild(&mut self, width: u32, height: u32) -> BackendResult<()> {
        let generation = self.take_generation();
        let gpu = self.gpu_mut()?;

        // Block until work referencing the old chain has completed.
        gpu.context
            .wait_idle()
            .map_err(|err| BackendError::Fatal(format!("{err:#}")))?;

        let fresh = SurfaceChain::create(&gpu.context, &gpu.staging, width, height, generation)
            .map_err(|err| BackendError::Fatal(format!("{err:#}")))?;
        let old = std::mem::replace(&mut gpu.chain, fresh);
        // The superseded generation outlives the handoff until the
        // first present on the new chain succeeds.
        gpu.retired = Some(old);
        gpu.refresh_pending = false;
        Ok(())
    }

    fn upload(&mut self, frame: &Frame<'_>) -> BackendResult<()> {
        let gpu = self.gpu()?;
        gpu.staging.upload(&gpu.context.device, &gpu.context.queue, frame)
    }

    /// Cursor composition happens on the HUD layer above this backend;
    /// shape events are declined so the caller routes them there.
    fn pointer_shape(&mut self, _shape: &CursorShape) -> BackendResult<()> {
        Err(BackendError::Unsupported("cursor shape composition"))
    }

    fn pointer_event(&mut self, _pointer: PointerState) -> BackendResult<()> {
        Err(BackendError::Unsupported("cursor state composition"))
    }

    fn step(&mut self) -> BackendResult<()> {
        if self.gpu()?.refresh_pending {
            let (width, height) = self.gpu()?.chain.extent;
            debug!(width, height, "rebuilding suboptimal surface before acquire");
            self.rebuild(width, height)?;
        }

        let gpu = self.gpu_mut()?;

        let acquire_start = Instant::now();
        let slot = gpu
            .context
            .surface
            .get_current_texture()
            .map_err(map_surface_error)?;
        let acquire_duration = acquire_start.elapsed();
        if acquire_duration > FRAME_BUDGET {
            warn!(
                acquire_ms = acquire_duration.as_millis() as u64,
                budget_ms = FRAME_BUDGET.as_millis() as u64,
                "slot acquisition exceeded the frame budget"
            );
        }
        if slot.suboptimal {
            // Still presentable this iteration; renegotiate afterwards.
            gpu.refresh_pending = true;
        }

        let view = slot
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&gpu.chain.pipeline);
            pass.set_bind_group(0, &gpu.chain.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        gpu.context.queue.submit(std::iter::once(encoder.finish()));
        slot.present();
        gpu.chain.presented = true;

        if let Some(retired) = gpu.retired.take() {
            debug!(
                generation = retired.generation,
                "released superseded chain after successful present"
            );
        }
        Ok(())
    }
}
