//! Render backends for framerelay.
//!
//! Frames arrive from the transport as raw pixel bytes; a render
//! backend moves them into presentable memory and puts them on screen.
//! The flow for the accelerated backend is:
//!
//! ```text
//!   configure ──▶ selector (score adapters) ──▶ GpuContext
//!                        │                          │
//!                        ▼                          ▼
//!                  StagingImage  ◀── on_frame   SurfaceChain (generation N)
//!                        │                          │
//!                        └── blit ──▶ acquire ▶ submit ▶ present
//! ```
//!
//! Two implementations share the `backend::BackendOps` contract:
//!
//! * [`WgpuRenderBackend`] uploads into a GPU staging image and blits
//!   it to the window surface each tick.
//! * [`SoftwareRenderBackend`] runs the same lifecycle over plain byte
//!   buffers with a readback path, doubling as the reference
//!   implementation for upload round-trip tests.

mod accelerated;
mod chain;
mod context;
mod selector;
mod software;
mod upload;

pub use accelerated::{WgpuRenderBackend, WGPU_RENDER_BACKEND};
pub use context::WindowTarget;
pub use software::{SoftwareRenderBackend, SoftwareTarget, SOFTWARE_RENDER_BACKEND};
