use crate::format::PixelFormat;

/// Capability variant of a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Host side: pulls frames off a display adapter.
    Capture,
    /// Client side: uploads and presents frames to a window.
    Render,
}

/// Immutable identity and capabilities of one concrete backend.
///
/// Descriptors live in a caller-owned list built at startup; there is
/// no process-wide registry.
#[derive(Clone, Copy, Debug)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub kind: BackendKind,
    /// Pixel formats this backend can be configured with.
    pub formats: &'static [PixelFormat],
    /// Whether the backend needs an on-screen surface to configure.
    pub needs_surface: bool,
}

impl BackendDescriptor {
    pub fn supports(&self, format: PixelFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// First descriptor of the requested kind that supports the format.
/// List order expresses caller preference.
pub fn pick_backend<'a>(
    available: &'a [BackendDescriptor],
    kind: BackendKind,
    format: PixelFormat,
) -> Option<&'a BackendDescriptor> {
    available
        .iter()
        .find(|descriptor| descriptor.kind == kind && descriptor.supports(format))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEL: BackendDescriptor = BackendDescriptor {
        name: "accel",
        kind: BackendKind::Render,
        formats: &[PixelFormat::Bgra8, PixelFormat::Rgba8],
        needs_surface: true,
    };

    const SOFT: BackendDescriptor = BackendDescriptor {
        name: "soft",
        kind: BackendKind::Render,
        formats: &[PixelFormat::Bgra8, PixelFormat::Rgba8, PixelFormat::Rgb8],
        needs_surface: false,
    };

    const DUP: BackendDescriptor = BackendDescriptor {
        name: "dup",
        kind: BackendKind::Capture,
        formats: &[PixelFormat::Bgra8],
        needs_surface: false,
    };

    #[test]
    fn list_order_expresses_preference() {
        let available = [ACCEL, SOFT, DUP];
        let picked = pick_backend(&available, BackendKind::Render, PixelFormat::Bgra8);
        assert_eq!(picked.map(|d| d.name), Some("accel"));
    }

    #[test]
    fn unsupported_format_falls_through() {
        let available = [ACCEL, SOFT];
        let picked = pick_backend(&available, BackendKind::Render, PixelFormat::Rgb8);
        assert_eq!(picked.map(|d| d.name), Some("soft"));
    }

    #[test]
    fn wrong_kind_yields_none() {
        let available = [DUP];
        assert!(pick_backend(&available, BackendKind::Render, PixelFormat::Bgra8).is_none());
    }
}
