//! Maps wgpu adapter enumeration onto the pure device-selection model.

use backend::{
    pick_swap_mode, select_candidate, BackendConfig, BackendError, DeviceCandidate, DeviceClass,
    SwapMode,
};
use tracing::{debug, warn};

pub(crate) fn classify(device_type: wgpu::DeviceType) -> DeviceClass {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => DeviceClass::Discrete,
        wgpu::DeviceType::IntegratedGpu => DeviceClass::Integrated,
        wgpu::DeviceType::VirtualGpu => DeviceClass::Virtual,
        wgpu::DeviceType::Cpu => DeviceClass::Cpu,
        wgpu::DeviceType::Other => DeviceClass::Other,
    }
}

pub(crate) fn swap_mode_of(mode: wgpu::PresentMode) -> Option<SwapMode> {
    match mode {
        wgpu::PresentMode::Mailbox => Some(SwapMode::TripleBuffer),
        wgpu::PresentMode::FifoRelaxed => Some(SwapMode::RelaxedVsync),
        wgpu::PresentMode::Immediate => Some(SwapMode::Immediate),
        wgpu::PresentMode::Fifo => Some(SwapMode::StrictVsync),
        _ => None,
    }
}

pub(crate) fn present_mode_of(mode: SwapMode) -> wgpu::PresentMode {
    match mode {
        SwapMode::TripleBuffer => wgpu::PresentMode::Mailbox,
        SwapMode::RelaxedVsync => wgpu::PresentMode::FifoRelaxed,
        SwapMode::Immediate => wgpu::PresentMode::Immediate,
        SwapMode::StrictVsync => wgpu::PresentMode::Fifo,
    }
}

/// Enumerates all adapters, applies the hard requirements against the
/// surface, and promotes the highest-scoring candidate. An explicit
/// adapter override wins whenever it names a usable adapter.
pub(crate) fn select_adapter(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    config: &BackendConfig,
) -> Result<wgpu::Adapter, BackendError> {
    let adapters = instance.enumerate_adapters(wgpu::Backends::all());

    let mut candidates = Vec::with_capacity(adapters.len());
    for adapter in &adapters {
        let info = adapter.get_info();
        let limits = adapter.limits();
        // Hard requirements: the adapter can present to this surface
        // with at least one usable format/present-mode pairing.
        let mut meets_requirements = adapter.is_surface_supported(surface);
        if meets_requirements {
            let caps = surface.get_capabilities(adapter);
            meets_requirements = !caps.formats.is_empty() && !caps.present_modes.is_empty();
        }
        candidates.push(DeviceCandidate {
            name: info.name,
            vendor_id: info.vendor,
            device_id: info.device,
            class: classify(info.device_type),
            max_dimension_2d: limits.max_texture_dimension_2d,
            has_advanced_feature: adapter
                .features()
                .contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS),
            meets_requirements,
        });
    }

    let chosen = match adapter_override(&candidates, config) {
        Some(index) => index,
        None => select_candidate(&candidates).ok_or_else(|| {
            BackendError::NoDevice(format!(
                "none of {} enumerated adapters can present to this surface",
                candidates.len()
            ))
        })?,
    };

    let candidate = &candidates[chosen];
    debug!(
        name = %candidate.name,
        class = ?candidate.class,
        score = candidate.score(),
        "selected GPU adapter"
    );

    adapters
        .into_iter()
        .nth(chosen)
        .ok_or_else(|| BackendError::fatal("adapter list changed during selection"))
}

fn adapter_override(candidates: &[DeviceCandidate], config: &BackendConfig) -> Option<usize> {
    let needle = config.adapter_override.as_ref()?.to_lowercase();
    let found = candidates
        .iter()
        .position(|c| c.meets_requirements && c.name.to_lowercase().contains(&needle));
    if found.is_none() {
        warn!(
            requested = %needle,
            "adapter override matched no usable adapter, falling back to scoring"
        );
    }
    found
}

/// Present mode per the priority list, honoring a configured override
/// when the device supports it. Strict vsync is the universal fallback.
pub(crate) fn choose_present_mode(
    present_modes: &[wgpu::PresentMode],
    config: &BackendConfig,
) -> wgpu::PresentMode {
    let supported: Vec<SwapMode> = present_modes
        .iter()
        .filter_map(|mode| swap_mode_of(*mode))
        .collect();

    if let Some(preferred) = config.swap_mode {
        if supported.contains(&preferred) {
            return present_mode_of(preferred);
        }
        warn!(?preferred, "requested swap mode unsupported, using priority list");
    }

    match pick_swap_mode(&supported) {
        Some(mode) => present_mode_of(mode),
        None => wgpu::PresentMode::Fifo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_types_map_onto_score_classes() {
        assert_eq!(classify(wgpu::DeviceType::DiscreteGpu), DeviceClass::Discrete);
        assert_eq!(classify(wgpu::DeviceType::Cpu), DeviceClass::Cpu);
        assert_eq!(classify(wgpu::DeviceType::Other), DeviceClass::Other);
    }

    #[test]
    fn present_mode_mapping_is_inverse_of_swap_mode_mapping() {
        for mode in [
            SwapMode::TripleBuffer,
            SwapMode::RelaxedVsync,
            SwapMode::Immediate,
            SwapMode::StrictVsync,
        ] {
            assert_eq!(swap_mode_of(present_mode_of(mode)), Some(mode));
        }
    }

    #[test]
    fn priority_list_prefers_mailbox_over_fifo() {
        let modes = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Mailbox];
        let chosen = choose_present_mode(&modes, &BackendConfig::default());
        assert_eq!(chosen, wgpu::PresentMode::Mailbox);
    }

    #[test]
    fn swap_mode_override_applies_only_when_supported() {
        let modes = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];
        let mut config = BackendConfig::default();
        config.swap_mode = Some(SwapMode::StrictVsync);
        assert_eq!(choose_present_mode(&modes, &config), wgpu::PresentMode::Fifo);

        config.swap_mode = Some(SwapMode::TripleBuffer);
        assert_eq!(
            choose_present_mode(&modes, &config),
            wgpu::PresentMode::Immediate
        );
    }

    #[test]
    fn instance_enumeration_does_not_panic() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        // May legitimately be empty on CI machines without GPU drivers.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        for adapter in &adapters {
            let _ = adapter.get_info();
        }
    }
}
