//! Capture backend: selects one display source, pulls frames from it
//! and publishes them through double-buffered slots.

use std::time::Duration;

use backend::{
    select_candidate, BackendConfig, BackendDescriptor, BackendError, BackendKind, BackendOps,
    BackendResult, CaptureOps, CursorShape, DeviceCandidate, Frame, FrameCompression, FrameFormat,
    OwnedFrame, PixelFormat, PointerState, TransientKind,
};
use tracing::{debug, info, warn};

use crate::mtcopy;
use crate::source::{DisplaySource, SourceDescriptor, SourceError};

pub const DISPLAY_CAPTURE_BACKEND: BackendDescriptor = BackendDescriptor {
    name: "display",
    kind: BackendKind::Capture,
    formats: &[PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::Rgb8],
    needs_surface: false,
};

/// Bounded wait for one frame from the source.
const FRAME_WAIT: Duration = Duration::from_millis(100);

struct ActiveCapture {
    sources: Vec<Box<dyn DisplaySource>>,
    chosen: usize,
    descriptor: SourceDescriptor,
    format: FrameFormat,
    /// Double-buffered publish slots: the loop writes `slots[back]`
    /// while a consumer reads the published one.
    slots: [OwnedFrame; 2],
    back: usize,
    published: Option<usize>,
    /// Set when the session invalidated; the next rebuild re-acquires.
    reacquire_pending: bool,
    pointer: PointerState,
    cursor: Option<CursorShape>,
}

/// Pulls frames from the highest-scoring display source.
///
/// `configure` takes ownership of the enumerated source list and keeps
/// it for the lifetime of the configuration, so an invalidated session
/// can fall back to re-acquiring without a fresh enumeration.
pub struct CaptureBackend {
    config: BackendConfig,
    initialized: bool,
    active: Option<ActiveCapture>,
}

impl CaptureBackend {
    pub fn new() -> Self {
        Self {
            config: BackendConfig::default(),
            initialized: false,
            active: None,
        }
    }

    fn active(&self) -> BackendResult<&ActiveCapture> {
        self.active
            .as_ref()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    fn active_mut(&mut self) -> BackendResult<&mut ActiveCapture> {
        self.active
            .as_mut()
            .ok_or_else(|| BackendError::fatal("backend is not configured"))
    }

    /// The most recently published frame, if any tick completed.
    pub fn published_frame(&self) -> Option<&OwnedFrame> {
        let active = self.active.as_ref()?;
        active.published.map(|index| &active.slots[index])
    }

    pub fn pointer(&self) -> Option<PointerState> {
        self.active.as_ref().map(|active| active.pointer)
    }

    pub fn cursor(&self) -> Option<&CursorShape> {
        self.active.as_ref()?.cursor.as_ref()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|active| active.descriptor.name.as_str())
    }
}

impl Default for CaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidate view of one enumerated source. Sources whose native format
/// differs from the requested transport format fail the hard
/// requirements; conversion is out of scope for the capture path.
fn candidate_of(descriptor: &SourceDescriptor, wanted: PixelFormat) -> DeviceCandidate {
    DeviceCandidate {
        name: descriptor.name.clone(),
        vendor_id: descriptor.vendor_id,
        device_id: descriptor.device_id,
        class: descriptor.class,
        max_dimension_2d: descriptor.width.max(descriptor.height),
        has_advanced_feature: false,
        meets_requirements: descriptor.width > 0
            && descriptor.height > 0
            && descriptor.format == wanted,
    }
}

fn choose_source(
    candidates: &[DeviceCandidate],
    config: &BackendConfig,
) -> Result<usize, BackendError> {
    if let Some(wanted) = config.adapter_override.as_deref() {
        let needle = wanted.to_lowercase();
        if let Some(index) = candidates
            .iter()
            .position(|c| c.meets_requirements && c.name.to_lowercase().contains(&needle))
        {
            info!(source = %candidates[index].name, "source selected by override");
            return Ok(index);
        }
        warn!(wanted, "source override matched nothing, falling back to scoring");
    }
    select_candidate(candidates).ok_or_else(|| {
        BackendError::NoDevice(format!(
            "none of {} enumerated sources meets the requirements",
            candidates.len()
        ))
    })
}

fn empty_slot(format: FrameFormat) -> OwnedFrame {
    OwnedFrame {
        format,
        data: vec![0; format.frame_bytes()],
    }
}

fn map_source_error(err: SourceError) -> BackendError {
    match err {
        SourceError::Invalidated => BackendError::Transient(TransientKind::SurfaceLost),
        SourceError::Timeout(_) => BackendError::Transient(TransientKind::AcquireTimeout),
        SourceError::Failed(message) => BackendError::Frame(message),
    }
}

impl BackendOps for CaptureBackend {
    type Target = Vec<Box<dyn DisplaySource>>;

    fn name(&self) -> &'static str {
        DISPLAY_CAPTURE_BACKEND.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Capture
    }

    fn setup(&mut self, config: &BackendConfig) -> BackendResult<()> {
        self.config = config.clone();
        self.initialized = true;
        Ok(())
    }

    /// Scores the enumerated sources, acquires the winner and sizes the
    /// publish slots from its descriptor. Failure drops everything
    /// built so far.
    fn activate(&mut self, mut sources: Self::Target, format: FrameFormat) -> BackendResult<()> {
        if !self.initialized {
            return Err(BackendError::fatal("activate called before setup"));
        }
        if sources.is_empty() {
            return Err(BackendError::NoDevice("no sources enumerated".into()));
        }

        let candidates: Vec<DeviceCandidate> = sources
            .iter()
            .map(|source| candidate_of(&source.describe(), format.format))
            .collect();
        let chosen = choose_source(&candidates, &self.config)?;

        sources[chosen].acquire().map_err(|err| {
            BackendError::fatal(format!(
                "failed to acquire source '{}': {err}",
                candidates[chosen].name
            ))
        })?;
        // Geometry may have settled during acquisition.
        let descriptor = sources[chosen].describe();
        let slot_format = FrameFormat::packed(descriptor.format, descriptor.width, descriptor.height);

        info!(
            source = %descriptor.name,
            width = descriptor.width,
            height = descriptor.height,
            format = ?descriptor.format,
            "capture source acquired"
        );

        self.active = Some(ActiveCapture {
            sources,
            chosen,
            descriptor,
            format: slot_format,
            slots: [empty_slot(slot_format), empty_slot(slot_format)],
            back: 0,
            published: None,
            reacquire_pending: false,
            pointer: PointerState::default(),
            cursor: None,
        });
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.sources[active.chosen].release();
        }
    }

    fn teardown(&mut self) {
        self.initialized = false;
    }

    fn chain_extent(&self) -> Option<(u32, u32)> {
        self.active
            .as_ref()
            .map(|active| (active.descriptor.width, active.descriptor.height))
    }

    /// For a capture backend "rebuild" means re-establishing the
    /// session: release, re-acquire, refresh the descriptor and resize
    /// the publish slots when the output geometry changed. The
    /// requested dimensions are advisory; the source dictates its own.
    fn rebuild(&mut self, _width: u32, _height: u32) -> BackendResult<()> {
        let active = self.active_mut()?;
        let source = &mut active.sources[active.chosen];
        source.release();
        source
            .acquire()
            .map_err(|err| BackendError::fatal(format!("re-acquisition failed: {err}")))?;
        let descriptor = source.describe();

        let slot_format =
            FrameFormat::packed(descriptor.format, descriptor.width, descriptor.height);
        if slot_format != active.format {
            debug!(
                width = descriptor.width,
                height = descriptor.height,
                "source geometry changed across re-acquisition"
            );
            active.slots = [empty_slot(slot_format), empty_slot(slot_format)];
            active.back = 0;
            active.published = None;
            active.format = slot_format;
        }
        active.descriptor = descriptor;
        active.reacquire_pending = false;
        Ok(())
    }

    /// Frames flow out of a capture backend, never in.
    fn upload(&mut self, _frame: &Frame<'_>) -> BackendResult<()> {
        Err(BackendError::Unsupported("frame injection"))
    }

    fn pointer_shape(&mut self, shape: &CursorShape) -> BackendResult<()> {
        let active = self.active_mut()?;
        active.cursor = Some(shape.clone());
        Ok(())
    }

    fn pointer_event(&mut self, pointer: PointerState) -> BackendResult<()> {
        let active = self.active_mut()?;
        active.pointer = pointer;
        Ok(())
    }

    /// One capture pass: bounded frame wait, banded copy into the back
    /// slot, publish. Invalidation and timeouts surface as transient
    /// failures so the loop driver runs its rebuild-and-retry.
    fn step(&mut self) -> BackendResult<()> {
        if self.active()?.reacquire_pending {
            // Session died and no rebuild has run since; re-acquire
            // before waiting on a dead session.
            debug!("re-acquiring invalidated session before the frame wait");
            let (width, height) = self
                .chain_extent()
                .ok_or_else(|| BackendError::fatal("backend is not configured"))?;
            self.rebuild(width, height)?;
        }

        let active = self.active_mut()?;
        let chosen = active.chosen;
        let back = active.back;

        if let Some(shape) = active.sources[chosen].cursor_shape() {
            active.cursor = Some(shape);
        }

        let frame = match active.sources[chosen].next_frame(FRAME_WAIT) {
            Ok(frame) => frame,
            Err(SourceError::Invalidated) => {
                warn!(source = %active.descriptor.name, "capture session invalidated");
                active.reacquire_pending = true;
                return Err(map_source_error(SourceError::Invalidated));
            }
            Err(err) => return Err(map_source_error(err)),
        };

        if frame.format.width != active.format.width
            || frame.format.height != active.format.height
            || frame.format.format != active.format.format
        {
            // Mid-stream mode change; resettle the session first.
            active.reacquire_pending = true;
            return Err(BackendError::Transient(TransientKind::SurfaceOutdated));
        }

        let slot = &mut active.slots[back];
        mtcopy::copy_rows(
            &mut slot.data,
            active.format.row_bytes(),
            frame.data,
            frame.format.pitch as usize,
            frame.format.row_bytes(),
            frame.format.height as usize,
        )?;
        if let Some(pointer) = frame.pointer {
            active.pointer = pointer;
        }

        active.published = Some(back);
        active.back ^= 1;
        Ok(())
    }
}

impl CaptureOps for CaptureBackend {
    fn frame_type(&self) -> Option<PixelFormat> {
        self.active.as_ref().map(|active| active.format.format)
    }

    fn frame_compression(&self) -> FrameCompression {
        FrameCompression::None
    }

    fn max_frame_size(&self) -> usize {
        self.active
            .as_ref()
            .map(|active| active.descriptor.frame_bytes())
            .unwrap_or(0)
    }
}
