//! Device candidate scoring and swap-mode selection.
//!
//! Both are pure functions over plain descriptions so selection is
//! deterministic and testable without a device present. The renderer
//! and capture crates translate their adapter/source enumerations into
//! [`DeviceCandidate`] values and act on the returned index.

use serde::{Deserialize, Serialize};

/// Broad adapter classification, used for the base score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Software,
    Other,
    Cpu,
    Virtual,
    Integrated,
    Discrete,
}

impl DeviceClass {
    pub fn base_score(self) -> u32 {
        match self {
            DeviceClass::Software | DeviceClass::Other => 100,
            DeviceClass::Cpu => 200,
            DeviceClass::Virtual => 300,
            DeviceClass::Integrated => 400,
            DeviceClass::Discrete => 500,
        }
    }
}

/// One enumerated adapter or capture source as seen by the selector.
///
/// Candidates are built fresh on every selection pass and never
/// retained past it. A candidate failing any hard requirement has
/// `meets_requirements` cleared and is skipped entirely; its score is
/// never computed.
#[derive(Clone, Debug)]
pub struct DeviceCandidate {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub class: DeviceClass,
    /// Largest supported 2-D image dimension.
    pub max_dimension_2d: u32,
    /// Whether the optional advanced feature the pipeline can exploit
    /// is present (worth a small bonus, never a requirement).
    pub has_advanced_feature: bool,
    /// All hard requirements passed for this candidate.
    pub meets_requirements: bool,
}

impl DeviceCandidate {
    pub fn score(&self) -> u32 {
        let bonus = if self.has_advanced_feature { 10 } else { 0 };
        self.class.base_score() + bonus + self.max_dimension_2d / 1000
    }
}

/// Index of the winning candidate. Ties break toward the earlier
/// enumeration position; `None` only when no candidate passes the hard
/// requirements.
pub fn select_candidate(candidates: &[DeviceCandidate]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.meets_requirements {
            continue;
        }
        let score = candidate.score();
        let improves = match best {
            None => true,
            // Strict inequality keeps the first of equal-scored candidates.
            Some((_, top)) => score > top,
        };
        if improves {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Presentation scheduling modes, named by behavior rather than by any
/// one platform's constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapMode {
    /// Triple-buffered, lowest latency without tearing.
    TripleBuffer,
    /// Vsync that tears instead of waiting when a frame is late.
    RelaxedVsync,
    /// Present immediately, always tearing.
    Immediate,
    /// Strict vsync, highest latency, universally available.
    StrictVsync,
}

/// Selection priority, lowest latency first.
pub const SWAP_MODE_PRIORITY: [SwapMode; 4] = [
    SwapMode::TripleBuffer,
    SwapMode::RelaxedVsync,
    SwapMode::Immediate,
    SwapMode::StrictVsync,
];

/// First mode from the priority list present in the supported set.
pub fn pick_swap_mode(supported: &[SwapMode]) -> Option<SwapMode> {
    SWAP_MODE_PRIORITY
        .iter()
        .copied()
        .find(|mode| supported.contains(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(class: DeviceClass, max_dimension_2d: u32) -> DeviceCandidate {
        DeviceCandidate {
            name: format!("{class:?}"),
            vendor_id: 0x1af4,
            device_id: 0x1050,
            class,
            max_dimension_2d,
            has_advanced_feature: false,
            meets_requirements: true,
        }
    }

    #[test]
    fn discrete_outranks_integrated() {
        // integrated 400+4 vs discrete 500+8
        let candidates = [
            candidate(DeviceClass::Integrated, 4096),
            candidate(DeviceClass::Discrete, 8192),
        ];
        assert_eq!(candidates[0].score(), 404);
        assert_eq!(candidates[1].score(), 508);
        assert_eq!(select_candidate(&candidates), Some(1));
    }

    #[test]
    fn equal_scores_break_toward_enumeration_order() {
        let candidates = [
            candidate(DeviceClass::Discrete, 8192),
            candidate(DeviceClass::Discrete, 8192),
        ];
        assert_eq!(select_candidate(&candidates), Some(0));
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = [
            candidate(DeviceClass::Virtual, 16384),
            candidate(DeviceClass::Integrated, 4096),
            candidate(DeviceClass::Cpu, 32768),
        ];
        let first = select_candidate(&candidates);
        for _ in 0..10 {
            assert_eq!(select_candidate(&candidates), first);
        }
        assert_eq!(first, Some(1));
    }

    #[test]
    fn failed_hard_requirements_exclude_even_the_best_score() {
        let mut discrete = candidate(DeviceClass::Discrete, 16384);
        discrete.meets_requirements = false;
        let candidates = [discrete, candidate(DeviceClass::Cpu, 2048)];
        assert_eq!(select_candidate(&candidates), Some(1));
    }

    #[test]
    fn no_passing_candidate_is_not_found() {
        let mut only = candidate(DeviceClass::Discrete, 16384);
        only.meets_requirements = false;
        assert_eq!(select_candidate(&[only]), None);
        assert_eq!(select_candidate(&[]), None);
    }

    #[test]
    fn advanced_feature_bonus_can_decide() {
        let mut featured = candidate(DeviceClass::Integrated, 4096);
        featured.has_advanced_feature = true;
        let plain = candidate(DeviceClass::Integrated, 8192);
        // 404+10 vs 408
        assert_eq!(select_candidate(&[plain, featured.clone()]), Some(1));
        assert_eq!(featured.score(), 414);
    }

    #[test]
    fn swap_mode_priority_prefers_triple_buffering() {
        let supported = [SwapMode::StrictVsync, SwapMode::TripleBuffer];
        assert_eq!(pick_swap_mode(&supported), Some(SwapMode::TripleBuffer));
    }

    #[test]
    fn swap_mode_falls_through_the_priority_list() {
        let supported = [SwapMode::StrictVsync, SwapMode::Immediate];
        assert_eq!(pick_swap_mode(&supported), Some(SwapMode::Immediate));
        assert_eq!(pick_swap_mode(&[SwapMode::StrictVsync]), Some(SwapMode::StrictVsync));
        assert_eq!(pick_swap_mode(&[]), None);
    }
}
