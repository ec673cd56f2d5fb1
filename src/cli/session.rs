use std::{
    io::{self, Write},
    path::Path,
};

use ansi_term::{Colour, Style};
use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::LinesStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    report::today_totals,
    store::{entities::Settings, storage::Storage, SessionStore},
    timer::{
        controller::{TimerCommand, TimerController},
        cue::{CuePlayer, Silent, TerminalBell},
        policy::BreakPreset,
        state::{TimerState, TimerStatus},
    },
    utils::{
        clock::DefaultClock,
        time::{format_clock, format_duration},
    },
};

use super::{open_storage, shutdown::detect_shutdown};

#[derive(Debug, Parser)]
pub struct StartCommand {
    #[arg(
        long,
        short,
        help = "Break preset for this session. Defaults to the saved setting"
    )]
    preset: Option<BreakPreset>,
    #[arg(long, short, help = "Don't ring the terminal bell on transitions")]
    quiet: bool,
}

const HELP: &str =
    "Commands: s(tart), b(reak), f(ocus), e(nd), q(uit). Ctrl-C or end of input ends the session";

/// Runs one interactive session. Commands are read line by line from stdin while the status
/// line is redrawn on every tick.
pub async fn process_start_command(
    StartCommand { preset, quiet }: StartCommand,
    dir: &Path,
) -> Result<()> {
    let storage = open_storage(dir)?;
    let settings = storage.load_settings().await.unwrap_or_else(|e| {
        warn!("Failed to load settings, using defaults {e:?}");
        Settings::default()
    });
    let preset = preset.unwrap_or(settings.break_preset);
    let cues: Box<dyn CuePlayer> = if quiet || !settings.cues {
        Box::new(Silent)
    } else {
        Box::new(TerminalBell::new(io::stdout()))
    };

    let store = SessionStore::load(storage).await;
    let mut controller = TimerController::new(store, cues, Box::new(DefaultClock), preset);

    let shutdown = CancellationToken::new();
    tokio::spawn(detect_shutdown(shutdown.clone()));

    println!("{}", Style::new().dimmed().paint(HELP));
    controller.start_session();

    let mut stdout = io::stdout();
    let result = controller
        .run(stdin_commands(), shutdown.clone(), |state| {
            let line = render_status(state, preset);
            if let Err(e) = write!(stdout, "\r\x1b[2K{line}").and_then(|_| stdout.flush()) {
                warn!("Failed to draw status {e:?}");
            }
        })
        .await;
    shutdown.cancel();
    println!();
    result?;

    let store = controller.into_sink();
    if let Some(session) = store.sessions().last() {
        println!(
            "Session finished: {} focus, {} break",
            format_duration(chrono::Duration::seconds(session.total_focus_time)),
            format_duration(chrono::Duration::seconds(session.total_break_time)),
        );
    }
    let today = today_totals(store.daily_totals(), Local::now().date_naive());
    println!(
        "Today: {} focus, {} break",
        format_duration(chrono::Duration::seconds(today.total_focus)),
        format_duration(chrono::Duration::seconds(today.total_break)),
    );
    Ok(())
}

/// Stdin lines as commands. Blank lines are ignored and unknown ones are reported.
fn stdin_commands() -> impl Stream<Item = TimerCommand> {
    LinesStream::new(BufReader::new(tokio::io::stdin()).lines())
        .map_while(|line| {
            line.inspect_err(|e| error!("Failed to read stdin {e:?}"))
                .ok()
        })
        .filter_map(|line| {
            if line.trim().is_empty() {
                return None;
            }
            match line.parse::<TimerCommand>() {
                Ok(command) => Some(command),
                Err(e) => {
                    warn!("{e}");
                    println!("{e}. {HELP}");
                    None
                }
            }
        })
}

fn render_status(state: &TimerState, preset: BreakPreset) -> String {
    let counter = format_clock(state.display_seconds());
    let (label, colour) = match state.status() {
        TimerStatus::Stopped => ("STOPPED", Colour::White),
        TimerStatus::Focus => ("FOCUS", Colour::Green),
        TimerStatus::Break => ("BREAK", Colour::Cyan),
    };
    let counter = if state.is_counting_down() {
        format!("{counter} left")
    } else {
        counter
    };
    format!(
        "{} {}  {}",
        colour.bold().paint(label),
        counter,
        Style::new().dimmed().paint(format!(
            "focus {} / break {} / {preset}",
            format_clock(state.total_focus()),
            format_clock(state.total_break()),
        ))
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{render_status, HELP};
    use crate::timer::{controller::TimerCommand, policy::BreakPreset, state::TimerState};

    #[test]
    fn test_help_lists_every_command() {
        let listed = ["s", "b", "f", "e", "q"]
            .into_iter()
            .inspect(|v| assert!(HELP.contains(&format!("{v}("))))
            .map(|v| v.parse::<TimerCommand>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            listed,
            vec![
                TimerCommand::Start,
                TimerCommand::Break,
                TimerCommand::Focus,
                TimerCommand::End,
                TimerCommand::Quit
            ]
        );
    }

    #[test]
    fn test_status_line() {
        let start = Utc.with_ymd_and_hms(2024, 4, 5, 9, 0, 0).unwrap();
        let mut state = TimerState::new();
        state.start_session(start);
        for second in 1..=65 {
            state.tick(start + Duration::seconds(second));
        }
        let focus = render_status(&state, BreakPreset::Preset2);
        assert!(focus.contains("FOCUS"));
        assert!(focus.contains("00:01:05"));
        assert!(focus.contains("preset2"));

        state.start_break(start + Duration::seconds(65), BreakPreset::Preset2);
        let rest = render_status(&state, BreakPreset::Preset2);
        assert!(rest.contains("BREAK"));
        assert!(rest.contains("00:01:00 left"));
    }
}
