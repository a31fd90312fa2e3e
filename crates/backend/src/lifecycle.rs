//! Backend lifecycle state machine and loop driver.
//!
//! `Lifecycle` wraps one concrete backend and owns every ordering
//! guard, so implementations can assume calls arrive in a legal order
//! on the single thread that owns the instance. The wrapper also runs
//! the per-iteration loop body: pending resize first, then one
//! acquire/submit/present pass with exactly one rebuild-and-retry on a
//! transient failure.

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::descriptor::BackendKind;
use crate::error::{BackendError, BackendResult};
use crate::format::{CursorShape, Frame, FrameCompression, FrameFormat, PixelFormat, PointerState, Rect};
use crate::stats::LoopStats;

/// Raw operations one concrete backend supplies.
///
/// Implementations never check call ordering; `Lifecycle` rejects
/// out-of-order calls before they get here. Partial-construction
/// rollback is the implementation's duty and falls out of scoped
/// ownership: any `?` inside `activate` drops everything built so far.
pub trait BackendOps {
    /// What `configure` needs to attach to: window handles for a render
    /// backend, a source list for a capture backend.
    type Target;

    fn name(&self) -> &'static str;
    fn kind(&self) -> BackendKind;

    /// Allocates the top-level context that outlives any single
    /// configuration. Failure must leave nothing allocated.
    fn setup(&mut self, config: &BackendConfig) -> BackendResult<()>;

    /// Runs device selection, logical-context creation, chain creation
    /// and upload-pipeline allocation, in that order. Failure must roll
    /// everything back.
    fn activate(&mut self, target: Self::Target, format: FrameFormat) -> BackendResult<()>;

    /// Tears down the upload pipeline, chain and logical context in
    /// reverse creation order, waiting out in-flight work. Best effort.
    fn deactivate(&mut self);

    /// Releases the top-level context.
    fn teardown(&mut self);

    /// Extent of the current chain, when one exists.
    fn chain_extent(&self) -> Option<(u32, u32)>;

    /// Drains work referencing the old chain, then recreates it at the
    /// new dimensions (clamped by the implementation).
    fn rebuild(&mut self, width: u32, height: u32) -> BackendResult<()>;

    /// Copies one frame into the staging path and completes its
    /// transfer within a bounded wait.
    fn upload(&mut self, frame: &Frame<'_>) -> BackendResult<()>;

    fn pointer_shape(&mut self, shape: &CursorShape) -> BackendResult<()>;
    fn pointer_event(&mut self, pointer: PointerState) -> BackendResult<()>;

    /// One presentation or capture pass: bounded acquire, submit,
    /// present/publish. Transient conditions come back as
    /// [`BackendError::Transient`]; the caller handles the retry.
    fn step(&mut self) -> BackendResult<()>;
}

/// Extra queries a capture backend exposes so the transport can size
/// its shared buffer. Render backends do not implement this.
pub trait CaptureOps: BackendOps {
    fn frame_type(&self) -> Option<PixelFormat>;
    fn frame_compression(&self) -> FrameCompression;
    /// Worst-case bytes for one uncompressed frame.
    fn max_frame_size(&self) -> usize;
}

/// Externally observable backend state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    /// Configured and healthy.
    Active,
    /// Configured, but the last frame or submit failed; resources are
    /// intact and the next success restores `Active`.
    Faulted,
}

impl LifecycleState {
    pub fn is_configured(self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::Faulted)
    }

    fn describe(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Active => "configured (active)",
            LifecycleState::Faulted => "configured (faulted)",
        }
    }
}

/// Drives one backend through the legal state sequence.
///
/// A single dedicated thread owns the instance end to end; nothing here
/// is shared across backend instances.
pub struct Lifecycle<B: BackendOps> {
    backend: B,
    state: LifecycleState,
    format: Option<FrameFormat>,
    pending_resize: Option<(u32, u32)>,
    stats: LoopStats,
}

impl<B: BackendOps> Lifecycle<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: LifecycleState::Uninitialized,
            format: None,
            pending_resize: None,
            stats: LoopStats::new(Instant::now()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The wrapped backend, for queries the state machine does not
    /// mediate (readback paths, transport accessors).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn expect_state(
        &self,
        wanted: LifecycleState,
        expected: &'static str,
    ) -> BackendResult<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(BackendError::InvalidState {
                expected,
                actual: self.state.describe(),
            })
        }
    }

    fn expect_configured(&self) -> BackendResult<()> {
        if self.state.is_configured() {
            Ok(())
        } else {
            Err(BackendError::InvalidState {
                expected: "configured",
                actual: self.state.describe(),
            })
        }
    }

    /// Allocates backend-local state and the top-level context. Failure
    /// leaves the backend `Uninitialized`.
    pub fn initialize(&mut self, config: &BackendConfig) -> BackendResult<()> {
        self.expect_state(LifecycleState::Uninitialized, "uninitialized")?;
        self.backend.setup(config)?;
        self.state = LifecycleState::Initialized;
        debug!(backend = self.backend.name(), "backend initialized");
        Ok(())
    }

    /// Runs selection → context → chain → upload pipeline. Any failure
    /// leaves the backend fully rolled back in `Initialized`; a second
    /// configure without an intervening deconfigure is rejected and the
    /// first configuration stays active.
    pub fn configure(&mut self, target: B::Target, format: FrameFormat) -> BackendResult<()> {
        self.expect_state(LifecycleState::Initialized, "initialized")?;
        self.backend.activate(target, format)?;
        self.format = Some(format);
        self.pending_resize = None;
        self.state = LifecycleState::Active;
        debug!(
            backend = self.backend.name(),
            width = format.width,
            height = format.height,
            format = ?format.format,
            "backend configured"
        );
        Ok(())
    }

    /// Best-effort teardown back to `Initialized`. A no-op outside the
    /// configured states.
    pub fn deconfigure(&mut self) {
        if !self.state.is_configured() {
            return;
        }
        self.backend.deactivate();
        self.format = None;
        self.pending_resize = None;
        self.state = LifecycleState::Initialized;
        debug!(backend = self.backend.name(), "backend deconfigured");
    }

    /// Deconfigures first when needed, then releases the top-level
    /// context. Always lands in `Uninitialized`.
    pub fn deinitialize(&mut self) {
        self.deconfigure();
        if self.state == LifecycleState::Initialized {
            self.backend.teardown();
        }
        self.state = LifecycleState::Uninitialized;
    }

    /// True iff the format matches the one used at configure time.
    /// False outside the configured states.
    pub fn is_compatible(&self, format: PixelFormat) -> bool {
        if !self.state.is_configured() {
            return false;
        }
        self.format.is_some_and(|configured| configured.format == format)
    }

    /// Records a pending rebuild applied at the next loop iteration.
    /// Dimensions equal to the current chain extent are a no-op.
    pub fn on_resize(&mut self, width: u32, height: u32, _dest: Rect) -> BackendResult<()> {
        self.expect_configured()?;
        if self.backend.chain_extent() == Some((width, height)) {
            self.pending_resize = None;
        } else {
            self.pending_resize = Some((width, height));
        }
        Ok(())
    }

    pub fn on_pointer_shape(&mut self, shape: &CursorShape) -> BackendResult<()> {
        self.expect_configured()?;
        self.backend.pointer_shape(shape)
    }

    pub fn on_pointer_event(&mut self, pointer: PointerState) -> BackendResult<()> {
        self.expect_configured()?;
        self.backend.pointer_event(pointer)
    }

    /// Delegates one frame to the upload pipeline. Failure moves the
    /// backend to `Faulted` without touching resources; the next
    /// successful call restores `Active`.
    pub fn on_frame(&mut self, frame: &Frame<'_>) -> BackendResult<()> {
        self.expect_configured()?;
        let configured = self.format.ok_or(BackendError::InvalidState {
            expected: "configured",
            actual: "configured without a format",
        })?;
        if frame.format.format != configured.format {
            self.state = LifecycleState::Faulted;
            return Err(BackendError::frame(format!(
                "frame format {:?} does not match configured {:?}",
                frame.format.format, configured.format
            )));
        }
        match self.backend.upload(frame) {
            Ok(()) => {
                self.state = LifecycleState::Active;
                Ok(())
            }
            Err(err) => {
                self.state = LifecycleState::Faulted;
                Err(err)
            }
        }
    }

    /// One presentation/capture iteration: apply a pending resize, then
    /// acquire/submit/present with at most one rebuild-and-retry on a
    /// transient failure. A second consecutive transient is reported
    /// upward, not retried further.
    pub fn tick(&mut self) -> BackendResult<()> {
        self.expect_configured()?;

        if let Some((width, height)) = self.pending_resize.take() {
            if let Err(err) = self.backend.rebuild(width, height) {
                // Leave the resize pending so the next iteration tries again.
                self.pending_resize = Some((width, height));
                return Err(err);
            }
        }

        match self.backend.step() {
            Ok(()) => self.step_succeeded(),
            Err(err) if err.is_transient() => {
                warn!(
                    backend = self.backend.name(),
                    error = %err,
                    "transient loop failure, rebuilding chain and retrying once"
                );
                let (width, height) = self.current_extent()?;
                self.backend.rebuild(width, height)?;
                match self.backend.step() {
                    Ok(()) => self.step_succeeded(),
                    Err(again) => {
                        // A per-frame failure faults here exactly as it
                        // would on the first attempt; a repeated
                        // transient only escalates.
                        if !again.is_transient() {
                            self.state = LifecycleState::Faulted;
                        }
                        Err(again)
                    }
                }
            }
            Err(err) => {
                self.state = LifecycleState::Faulted;
                Err(err)
            }
        }
    }

    fn step_succeeded(&mut self) -> BackendResult<()> {
        self.state = LifecycleState::Active;
        self.stats.record_frame(Instant::now());
        Ok(())
    }

    fn current_extent(&self) -> BackendResult<(u32, u32)> {
        if let Some(extent) = self.backend.chain_extent() {
            return Ok(extent);
        }
        self.format
            .map(|format| (format.width, format.height))
            .ok_or_else(|| BackendError::fatal("no chain extent available for rebuild"))
    }
}

impl<B: CaptureOps> Lifecycle<B> {
    /// Pixel format of captured frames; `None` before configure.
    pub fn frame_type(&self) -> Option<PixelFormat> {
        self.backend.frame_type()
    }

    pub fn frame_compression(&self) -> FrameCompression {
        self.backend.frame_compression()
    }

    /// Worst-case frame size the transport must budget for.
    pub fn max_frame_size(&self) -> usize {
        self.backend.max_frame_size()
    }
}
