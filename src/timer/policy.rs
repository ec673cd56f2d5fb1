use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const MINUTE: u64 = 60;

/// How the length of a break is chosen once focus ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BreakPreset {
    /// Breaks are open ended and count up until the user resumes.
    #[default]
    Default,
    /// A fifth of the focus time, at least a minute.
    Preset2,
    /// Fixed tiers: 5, 8, 10 or 15 minutes depending on focus length.
    Preset3,
}

impl BreakPreset {
    /// Whether breaks under this preset count down to an automatic resume.
    pub fn is_capped(&self) -> bool {
        !matches!(self, BreakPreset::Default)
    }
}

impl Display for BreakPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakPreset::Default => write!(f, "default"),
            BreakPreset::Preset2 => write!(f, "preset2"),
            BreakPreset::Preset3 => write!(f, "preset3"),
        }
    }
}

/// Break length in seconds for a focus period that lasted `last_focus_duration` seconds.
/// Returns 0 for [BreakPreset::Default], meaning there is no target.
pub fn compute_break_duration(preset: BreakPreset, last_focus_duration: u64) -> u64 {
    match preset {
        BreakPreset::Default => 0,
        BreakPreset::Preset2 => u64::max(MINUTE, last_focus_duration / 5),
        BreakPreset::Preset3 => match last_focus_duration {
            d if d < 25 * MINUTE => 5 * MINUTE,
            d if d < 50 * MINUTE => 8 * MINUTE,
            d if d < 90 * MINUTE => 10 * MINUTE,
            _ => 15 * MINUTE,
        },
    }
}
