//! Host-side capture engine for framerelay.
//!
//! Frames flow from a platform [`DisplaySource`] through the
//! [`CaptureBackend`] into double-buffered publish slots the transport
//! reads:
//!
//! ```text
//!   DisplaySource ──▶ CaptureBackend::step ──▶ mtcopy ──▶ publish slot
//!        │                   │
//!        │ invalidated       └─▶ transient failure ▶ re-acquire ▶ retry
//!        └─────────────────────────────────────────────┘
//! ```
//!
//! The backend plugs into `backend::Lifecycle` like any other; session
//! invalidation surfaces as a transient failure, so the loop driver's
//! rebuild-and-retry doubles as re-acquisition. [`PatternSource`] is a
//! synthetic source for tests and headless runs.

pub mod backend;
pub mod mtcopy;
pub mod pattern;
pub mod source;

pub use crate::backend::{CaptureBackend, DISPLAY_CAPTURE_BACKEND};
pub use crate::pattern::PatternSource;
pub use crate::source::{DisplaySource, SourceDescriptor, SourceError, SourceFrame};
