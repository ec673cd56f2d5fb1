use std::{fmt::Display, path::Path};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::{
    store::{entities::Settings, storage::Storage},
    timer::policy::BreakPreset,
};

use super::open_storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(value: Toggle) -> Self {
        matches!(value, Toggle::On)
    }
}

impl Display for Toggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Toggle::On => write!(f, "on"),
            Toggle::Off => write!(f, "off"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct SettingsCommand {
    #[arg(long, short, help = "Break preset used by new sessions")]
    preset: Option<BreakPreset>,
    #[arg(long, help = "Ring the terminal bell on transitions")]
    cues: Option<Toggle>,
}

/// Prints the saved settings, updating them first when any option is given.
pub async fn process_settings_command(
    SettingsCommand { preset, cues }: SettingsCommand,
    dir: &Path,
) -> Result<()> {
    let storage = open_storage(dir)?;
    let settings = storage.load_settings().await?;
    let updated = apply_changes(settings.clone(), preset, cues);
    if updated != settings {
        storage.save_settings(&updated).await?;
        info!("Settings changed to {updated:?}");
    }

    println!("preset\t{}", updated.break_preset);
    println!(
        "cues\t{}",
        if updated.cues { Toggle::On } else { Toggle::Off }
    );
    Ok(())
}

fn apply_changes(mut settings: Settings, preset: Option<BreakPreset>, cues: Option<Toggle>) -> Settings {
    if let Some(preset) = preset {
        settings.break_preset = preset;
    }
    if let Some(cues) = cues {
        settings.cues = cues.into();
    }
    settings
}
