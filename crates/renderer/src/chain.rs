//! Output-size-dependent GPU objects, created and destroyed as a unit.

use anyhow::Result;
use tracing::{debug, warn};

use crate::context::GpuContext;
use crate::upload::StagingImage;

/// Fullscreen-triangle blit: samples the staging image across the whole
/// surface.
const BLIT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var out: VertexOutput;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, in.uv);
}
"#;

/// One generation of presentable objects, valid for exactly one
/// `(width, height, format)` triple.
///
/// Creation runs in a fixed dependency order: surface configuration
/// (the presentable image set) → pipeline → sampler → bind group. Any
/// failing step unwinds through `?` and every object built so far is
/// dropped on its own, so no partial chain is ever reachable by the
/// presentation step. Per-slot commands are encoded at present time
/// against this generation's pipeline; wgpu does not hand out the
/// swapchain images for pre-recording.
pub(crate) struct SurfaceChain {
    pub generation: u64,
    pub extent: (u32, u32),
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    /// Set after the first successful present with this generation;
    /// gates the release of the superseded chain.
    pub presented: bool,
}

impl SurfaceChain {
    pub(crate) fn create(
        context: &GpuContext,
        staging: &StagingImage,
        width: u32,
        height: u32,
        generation: u64,
    ) -> Result<Self> {
        let (width, height) = clamp_extent(&context.limits, width, height);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: context.surface_format,
            width,
            height,
            present_mode: context.present_mode,
            alpha_mode: context.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: context.latency_frames,
        };
        context.surface.configure(&context.device, &config);

        let module = context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("frame blit shader"),
                source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
            });

        let pipeline = context
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("frame blit pipeline"),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: context.surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame blit sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame blit bind group"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&staging.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });

        debug!(generation, width, height, "created resource chain");

        Ok(Self {
            generation,
            extent: (width, height),
            pipeline,
            bind_group,
            presented: false,
        })
    }
}

/// Clamps requested dimensions to what the device supports.
pub(crate) fn clamp_extent(limits: &wgpu::Limits, width: u32, height: u32) -> (u32, u32) {
    let max = limits.max_texture_dimension_2d;
    let clamped = (width.clamp(1, max), height.clamp(1, max));
    if clamped != (width, height) {
        warn!(
            requested_width = width,
            requested_height = height,
            clamped_width = clamped.0,
            clamped_height = clamped.1,
            "clamped chain extent to device limits"
        );
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_is_clamped_to_device_limits() {
        let limits = wgpu::Limits {
            max_texture_dimension_2d: 4096,
            ..Default::default()
        };
        assert_eq!(clamp_extent(&limits, 8192, 2160), (4096, 2160));
        assert_eq!(clamp_extent(&limits, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn zero_extent_is_raised_to_the_minimum() {
        let limits = wgpu::Limits::default();
        assert_eq!(clamp_extent(&limits, 0, 0), (1, 1));
    }
}
