use serde::{Deserialize, Serialize};

use crate::score::SwapMode;

/// Opaque configuration handed into `initialize`/`configure`.
///
/// Backends act on the options they recognize and ignore the rest;
/// environment and CLI parsing happen upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Case-insensitive substring matched against adapter names; when
    /// it names a usable adapter, scoring is bypassed.
    pub adapter_override: Option<String>,
    /// Desired maximum frames in flight; clamped to 1..=3 at use.
    pub latency_frames: Option<u32>,
    /// Forces a swap mode when the device supports it; otherwise the
    /// priority list applies.
    pub swap_mode: Option<SwapMode>,
}

impl BackendConfig {
    /// Frame latency with the valid-range clamp applied.
    pub fn clamped_latency(&self) -> u32 {
        self.latency_frames.unwrap_or(2).clamp(1, 3)
    }
}
