//! Core library for the framerelay backend engine.
//!
//! A backend is one concrete capture or render implementation: the host
//! side pulls frames off a display adapter, the client side uploads and
//! presents them in a window. Both sides share the machinery in this
//! crate. The overall flow is:
//!
//! ```text
//!   transport ──▶ FrameHandoff ──▶ Lifecycle<B> ──▶ BackendOps (concrete)
//!                                      │
//!                 configure ──▶ device selection (score) ──▶ chain + staging
//!                 tick      ──▶ pending resize ▶ acquire ▶ submit ▶ present
//! ```
//!
//! `Lifecycle` owns every state guard, so concrete backends only supply
//! the raw operations (`BackendOps`). Device scoring and swap-mode
//! selection are pure functions over [`score::DeviceCandidate`] so they
//! can be exercised without any GPU present; the renderer crate maps
//! `wgpu` types onto them.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod handoff;
pub mod lifecycle;
pub mod score;
pub mod stats;

pub use config::BackendConfig;
pub use descriptor::{pick_backend, BackendDescriptor, BackendKind};
pub use error::{BackendError, BackendResult, TransientKind};
pub use format::{
    CursorShape, Frame, FrameCompression, FrameFormat, OwnedFrame, PixelFormat, PointerState, Rect,
};
pub use handoff::{frame_handoff, FrameConsumer, FrameProducer, HandoffError};
pub use lifecycle::{BackendOps, CaptureOps, Lifecycle, LifecycleState};
pub use score::{pick_swap_mode, select_candidate, DeviceCandidate, DeviceClass, SwapMode};
pub use stats::LoopStats;
