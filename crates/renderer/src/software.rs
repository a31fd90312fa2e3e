//! Software render backend.
//!
//! Same lifecycle shape as the accelerated backend, expressed over
//! plain byte buffers: the staging buffer and resident image are
//! vectors, the chain's presentable slot is a front buffer the window
//! blitter (outside this crate) reads. Because every stage is
//! CPU-visible it also serves as the readback reference for upload
//! round-trip tests.

use backend::{
    BackendConfig, BackendDescriptor, BackendError, BackendKind, BackendOps, BackendResult,
    CursorShape, Frame, FrameFormat, PixelFormat, PointerState,
};
use tracing::debug;

pub const SOFTWARE_RENDER_BACKEND: BackendDescriptor = BackendDescriptor {
    name: "software",
    kind: BackendKind::Render,
    formats: &[PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::Rgb8],
    needs_surface: false,
};

/// CPU images have no driver limit worth modeling beyond a sanity cap.
const MAX_CPU_DIMENSION: u32 = 16384;

/// Initial output size for the software path.
#[derive(Clone, Copy, Debug)]
pub struct SoftwareTarget {
    pub width: u32,
    pub height: u32,
}

struct CpuChain {
    generation: u64,
    extent: (u32, u32),
    /// Presentable slot the external blitter reads.
    front: Vec<u8>,
    presented: bool,
}

impl CpuChain {
    fn new(format: &FrameFormat, width: u32, height: u32, generation: u64) -> Self {
        let width = width.clamp(1, MAX_CPU_DIMENSION);
        let height = height.clamp(1, MAX_CPU_DIMENSION);
        let bytes = width as usize * height as usize * format.format.bytes_per_pixel() as usize;
        Self {
            generation,
            extent: (width, height),
            front: vec![0; bytes],
            presented: false,
        }
    }
}

struct CpuState {
    format: FrameFormat,
    /// `height * pitch` staging bytes; layout fixed at configure time.
    staging: Vec<u8>,
    staging_pitch: usize,
    /// The "GPU-resident" image: tightly packed rows.
    resident: Vec<u8>,
    chain: CpuChain,
    retired: Option<CpuChain>,
    pointer: PointerState,
}

/// Reference renderer used when no accelerated adapter is usable and by
/// tests that need byte-level readback.
pub struct SoftwareRenderBackend {
    initialized: bool,
    state: Option<CpuState>,
    next_generation: u64,
}

impl SoftwareRenderBackend {
    pub fn new() -> Self {
        Self {
            initialized: false,
            state: None,
            next_generation: 0,
        }
    }

    fn state(&self) -> BackendResult<&CpuState> {
        self.state
            .as_ref()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    fn state_mut(&mut self) -> BackendResult<&mut CpuState> {
        self.state
            .as_mut()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    fn take_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// The resident image, tightly packed. Test readback path.
    pub fn readback(&self) -> Option<&[u8]> {
        self.state.as_ref().map(|state| state.resident.as_slice())
    }

    /// The presentable front buffer after the last successful present.
    pub fn front_buffer(&self) -> Option<&[u8]> {
        self.state
            .as_ref()
            .filter(|state| state.chain.presented)
            .map(|state| state.chain.front.as_slice())
    }

    pub fn chain_generation(&self) -> Option<u64> {
        self.state.as_ref().map(|state| state.chain.generation)
    }

    pub fn has_retired_chain(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.retired.is_some())
    }

    pub fn pointer(&self) -> Option<PointerState> {
        self.state.as_ref().map(|state| state.pointer)
    }
}

impl Default for SoftwareRenderBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendOps for SoftwareRenderBackend {
    type Target = SoftwareTarget;

    fn name(&self) -> &'static str {
        SOFTWARE_RENDER_BACKEND.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Render
    }

    fn setup(&mut self, _config: &BackendConfig) -> BackendResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn activate(&mut self, target: SoftwareTarget, format: FrameFormat) -> BackendResult<()> {
        if !self.initialized {
            return Err(BackendError::fatal("activate called before setup"));
        }
        if format.width == 0 || format.height == 0 {
            return Err(BackendError::fatal("frame format has a zero dimension"));
        }
        if (format.pitch as usize) < format.row_bytes() {
            return Err(BackendError::fatal("frame pitch is smaller than one row"));
        }

        let staging_pitch = format.pitch as usize;
        let staging = vec![0; format.height as usize * staging_pitch];
        let resident = vec![0; format.height as usize * format.row_bytes()];
        let generation = self.take_generation();
        let chain = CpuChain::new(&format, target.width, target.height, generation);

        self.state = Some(CpuState {
            format,
            staging,
            staging_pitch,
            resident,
            chain,
            retired: None,
            pointer: PointerState::default(),
        });
        Ok(())
    }

    fn deactivate(&mut self) {
        self.state = None;
    }

    fn teardown(&mut self) {
        self.initialized = false;
    }

    fn chain_extent(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|state| state.chain.extent)
    }

    fn rebuild(&mut self, width: u32, height: u32) -> BackendResult<()> {
        let generation = self.take_generation();
        let state = self.state_mut()?;
        let fresh = CpuChain::new(&state.format, width, height, generation);
        let old = std::mem::replace(&mut state.chain, fresh);
        state.retired = Some(old);
        debug!(generation, width, height, "rebuilt software chain");
        Ok(())
    }

    /// Staged copy, then the "transfer" into the resident image. Both
    /// copies take their destination layout from the fixed staging
    /// format, never from the incoming frame.
    fn upload(&mut self, frame: &Frame<'_>) -> BackendResult<()> {
        let state = self.state_mut()?;
        if frame.format.width != state.format.width
            || frame.format.height != state.format.height
            || frame.format.format != state.format.format
        {
            return Err(BackendError::frame(format!(
                "frame {}x{} {:?} does not match staging layout {}x{} {:?}",
                frame.format.width,
                frame.format.height,
                frame.format.format,
                state.format.width,
                state.format.height,
                state.format.format,
            )));
        }

        let row_bytes = state.format.row_bytes();
        for y in 0..state.format.height {
            let source = frame
                .row(y)
                .ok_or_else(|| BackendError::frame(format!("frame buffer truncated at row {y}")))?;
            let offset = y as usize * state.staging_pitch;
            state.staging[offset..offset + row_bytes].copy_from_slice(source);
        }
        let (staging, resident) = (&state.staging, &mut state.resident);
        for y in 0..state.format.height as usize {
            let src = y * state.staging_pitch;
            let dst = y * row_bytes;
            resident[dst..dst + row_bytes].copy_from_slice(&staging[src..src + row_bytes]);
        }
        Ok(())
    }

    fn pointer_shape(&mut self, _shape: &CursorShape) -> BackendResult<()> {
        // Accepted; composition happens when the front buffer is shown.
        self.state()?;
        Ok(())
    }

    fn pointer_event(&mut self, pointer: PointerState) -> BackendResult<()> {
        let state = self.state_mut()?;
        state.pointer = pointer;
        Ok(())
    }

    /// Present: copy the overlapping region of the resident image into
    /// the front buffer, top-left anchored.
    fn step(&mut self) -> BackendResult<()> {
        let state = self.state_mut()?;
        let bpp = state.format.format.bytes_per_pixel() as usize;
        let (chain_w, chain_h) = state.chain.extent;
        let copy_w = (state.format.width.min(chain_w)) as usize * bpp;
        let copy_h = state.format.height.min(chain_h) as usize;
        let src_pitch = state.format.row_bytes();
        let dst_pitch = chain_w as usize * bpp;

        for y in 0..copy_h {
            let src = y * src_pitch;
            let dst = y * dst_pitch;
            let (resident, front) = (&state.resident, &mut state.chain.front);
            front[dst..dst + copy_w].copy_from_slice(&resident[src..src + copy_w]);
        }
        state.chain.presented = true;

        if let Some(retired) = state.retired.take() {
            debug!(
                generation = retired.generation,
                "released superseded software chain"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::{BackendConfig, Lifecycle, LifecycleState, Rect};

    fn gradient_frame(format: FrameFormat) -> Vec<u8> {
        let mut data = vec![0u8; format.frame_bytes()];
        let bpp = format.format.bytes_per_pixel() as usize;
        for y in 0..format.height {
            for x in 0..format.width {
                let offset = y as usize * format.pitch as usize + x as usize * bpp;
                for channel in 0..bpp {
                    data[offset + channel] = ((x + y) as usize * 7 + channel) as u8;
                }
            }
        }
        data
    }

    fn configured(width: u32, height: u32, format: FrameFormat) -> Lifecycle<SoftwareRenderBackend> {
        let mut lifecycle = Lifecycle::new(SoftwareRenderBackend::new());
        lifecycle.initialize(&BackendConfig::default()).unwrap();
        lifecycle
            .configure(SoftwareTarget { width, height }, format)
            .unwrap();
        lifecycle
    }

    #[test]
    fn solid_frame_round_trips_byte_identically() {
        let format = FrameFormat::packed(PixelFormat::Bgra8, 64, 32);
        let mut lifecycle = configured(64, 32, format);
        let data = vec![0x5Au8; format.frame_bytes()];
        lifecycle
            .on_frame(&Frame {
                format,
                data: &data,
            })
            .unwrap();
        assert_eq!(lifecycle.backend().readback(), Some(data.as_slice()));
    }

    #[test]
    fn padded_pitch_round_trips_the_visible_pixels() {
        let mut format = FrameFormat::packed(PixelFormat::Rgb8, 11, 7);
        format.pitch = 64; // deliberately padded rows
        let data = gradient_frame(format);
        let mut lifecycle = configured(11, 7, format);
        lifecycle
            .on_frame(&Frame {
                format,
                data: &data,
            })
            .unwrap();

        let resident = lifecycle.backend().readback().unwrap();
        for y in 0..format.height {
            let src = y as usize * format.pitch as usize;
            let dst = y as usize * format.row_bytes();
            assert_eq!(
                &resident[dst..dst + format.row_bytes()],
                &data[src..src + format.row_bytes()],
                "row {y} differs"
            );
        }
    }

    #[test]
    fn present_publishes_the_resident_image() {
        let format = FrameFormat::packed(PixelFormat::Rgba8, 8, 8);
        let mut lifecycle = configured(8, 8, format);
        let data = gradient_frame(format);
        lifecycle
            .on_frame(&Frame {
                format,
                data: &data,
            })
            .unwrap();

        assert!(lifecycle.backend().front_buffer().is_none());
        lifecycle.tick().unwrap();
        assert_eq!(lifecycle.backend().front_buffer(), Some(data.as_slice()));
    }

    #[test]
    fn resize_rebuilds_once_and_retires_the_old_generation() {
        let format = FrameFormat::packed(PixelFormat::Bgra8, 16, 16);
        let mut lifecycle = configured(16, 16, format);
        lifecycle.tick().unwrap();
        assert_eq!(lifecycle.backend().chain_generation(), Some(0));

        lifecycle.on_resize(32, 24, Rect::default()).unwrap();
        lifecycle.tick().unwrap();
        assert_eq!(lifecycle.backend().chain_generation(), Some(1));
        assert_eq!(lifecycle.backend().chain_extent(), Some((32, 24)));
        // Retired generation released after the successful present.
        assert!(!lifecycle.backend().has_retired_chain());
    }

    #[test]
    fn mismatched_upload_faults_without_damaging_contents() {
        let format = FrameFormat::packed(PixelFormat::Bgra8, 8, 4);
        let mut lifecycle = configured(8, 4, format);
        let good = vec![0x11u8; format.frame_bytes()];
        lifecycle
            .on_frame(&Frame {
                format,
                data: &good,
            })
            .unwrap();

        let wrong = FrameFormat::packed(PixelFormat::Bgra8, 4, 4);
        let bad = vec![0x22u8; wrong.frame_bytes()];
        assert!(lifecycle
            .on_frame(&Frame {
                format: wrong,
                data: &bad,
            })
            .is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Faulted);
        // Previous contents are intact and can be re-presented.
        assert_eq!(lifecycle.backend().readback(), Some(good.as_slice()));

        lifecycle.tick().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Active);
    }

    #[test]
    fn pointer_events_are_accepted_and_tracked() {
        let format = FrameFormat::packed(PixelFormat::Bgra8, 8, 8);
        let mut lifecycle = configured(8, 8, format);
        lifecycle
            .on_pointer_event(PointerState {
                visible: true,
                x: 3,
                y: 5,
            })
            .unwrap();
        assert_eq!(
            lifecycle.backend().pointer(),
            Some(PointerState {
                visible: true,
                x: 3,
                y: 5,
            })
        );
    }

    #[test]
    fn zero_extent_target_is_clamped_not_rejected() {
        let format = FrameFormat::packed(PixelFormat::Bgra8, 8, 8);
        let lifecycle = configured(0, 0, format);
        assert_eq!(lifecycle.backend().chain_extent(), Some((1, 1)));
    }
}
