use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    store::{entities::Session, SessionSink},
    utils::clock::Clock,
};

use super::{
    cue::{Cue, CuePlayer},
    policy::BreakPreset,
    state::{Tick, TimerState, TimerStatus},
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// User requests accepted by [TimerController::run].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Break,
    Focus,
    End,
    /// Ends a running session and leaves the loop.
    Quit,
}

impl FromStr for TimerCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "start" => Ok(Self::Start),
            "b" | "break" => Ok(Self::Break),
            "f" | "focus" | "r" | "resume" => Ok(Self::Focus),
            "e" | "end" => Ok(Self::End),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(anyhow!("Unknown command {other:?}")),
        }
    }
}

/// Owns the running [TimerState] together with everything around it: the clock transitions are
/// stamped with, the one-second tick schedule, the cue player and the sink finished sessions go
/// to.
///
/// The tick schedule is armed whenever a period starts and cleared when the timer stops, so focus
/// and break ticks never overlap and a stopped timer never ticks.
pub struct TimerController<K> {
    state: TimerState,
    preset: BreakPreset,
    sink: K,
    cues: Box<dyn CuePlayer>,
    clock: Box<dyn Clock>,
    tick_interval: Duration,
    next_tick: Option<Instant>,
}

impl<K: SessionSink> TimerController<K> {
    pub fn new(
        sink: K,
        cues: Box<dyn CuePlayer>,
        clock: Box<dyn Clock>,
        preset: BreakPreset,
    ) -> Self {
        Self {
            state: TimerState::new(),
            preset,
            sink,
            cues,
            clock,
            tick_interval: DEFAULT_TICK_INTERVAL,
            next_tick: None,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn preset(&self) -> BreakPreset {
        self.preset
    }

    /// Takes effect from the next break.
    pub fn set_preset(&mut self, preset: BreakPreset) {
        self.preset = preset;
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    pub fn start_session(&mut self) {
        let cue = self.state.start_session(self.clock.timestamp());
        self.after_transition(cue, "start session");
    }

    pub fn start_break(&mut self) {
        let cue = self.state.start_break(self.clock.timestamp(), self.preset);
        if cue.is_some() {
            info!(
                "Break started with target {}s under {}",
                self.state.break_target(),
                self.preset
            );
        }
        self.after_transition(cue, "start break");
    }

    pub fn resume_focus(&mut self) {
        let cue = self.state.resume_focus(self.clock.timestamp());
        self.after_transition(cue, "resume focus");
    }

    /// Closes the session, hands it to the sink and stops the timer. Returns the finished session,
    /// if one was running.
    pub async fn end_session(&mut self) -> Option<Session> {
        let id = Uuid::new_v4().to_string();
        let session = self.state.end_session(self.clock.timestamp(), id);
        self.next_tick = None;
        if let Some(session) = &session {
            self.sink.session_ended(session.clone()).await;
        } else {
            debug!("End requested without a running session");
        }
        self.play(Cue::SessionEnd);
        session
    }

    /// Advances the live counters by one second. Only [run](Self::run) calls this on schedule;
    /// it is public so the machine can be stepped by hand.
    pub fn tick(&mut self) -> Tick {
        let tick = self.state.tick(self.clock.timestamp());
        match tick {
            Tick::Idle => self.next_tick = None,
            Tick::Counted => {
                self.next_tick = self.next_tick.map(|v| v + self.tick_interval);
            }
            Tick::Resumed => {
                info!("Break ran out, resuming focus");
                self.play(Cue::FocusStart);
                self.reschedule();
            }
        }
        tick
    }

    pub async fn apply(&mut self, command: TimerCommand) {
        debug!("Applying {command:?}");
        match command {
            TimerCommand::Start => self.start_session(),
            TimerCommand::Break => self.start_break(),
            TimerCommand::Focus => self.resume_focus(),
            TimerCommand::End => {
                self.end_session().await;
            }
            TimerCommand::Quit => {
                if self.state.status() != TimerStatus::Stopped {
                    self.end_session().await;
                }
            }
        }
    }

    /// Executes the timer event loop until [TimerCommand::Quit], the end of `commands` or
    /// `shutdown`. A running session is ended before returning. `on_update` sees the state after
    /// every tick and command.
    #[instrument(skip_all)]
    pub async fn run(
        &mut self,
        commands: impl Stream<Item = TimerCommand>,
        shutdown: CancellationToken,
        mut on_update: impl FnMut(&TimerState),
    ) -> Result<()> {
        let mut commands = std::pin::pin!(commands);
        loop {
            on_update(&self.state);

            let tick_at = self.next_tick;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                command = commands.next() => match command {
                    Some(TimerCommand::Quit) | None => break,
                    Some(command) => self.apply(command).await,
                },
                _ = self.clock.sleep_until(tick_at.unwrap_or_else(Instant::now)), if tick_at.is_some() => {
                    self.tick();
                }
            }
        }

        if self.state.status() != TimerStatus::Stopped {
            self.end_session().await;
            on_update(&self.state);
        }
        Ok(())
    }

    fn after_transition(&mut self, cue: Option<Cue>, name: &str) {
        match cue {
            Some(cue) => {
                info!("Timer is now {:?}", self.state.status());
                self.reschedule();
                self.play(cue);
            }
            None => warn!(
                "Ignoring {name} while the timer is {:?}",
                self.state.status()
            ),
        }
    }

    fn reschedule(&mut self) {
        self.next_tick = match self.state.status() {
            TimerStatus::Stopped => None,
            TimerStatus::Focus | TimerStatus::Break => {
                Some(self.clock.instant() + self.tick_interval)
            }
        };
    }

    fn play(&mut self, cue: Cue) {
        if let Err(e) = self.cues.play(cue) {
            warn!("Failed to play {cue:?} {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;
    use tokio_util::sync::CancellationToken;

    use super::{TimerCommand, TimerController};
    use crate::{
        store::{entities::Session, SessionSink},
        timer::{
            cue::{Cue, MockCuePlayer, Silent},
            policy::BreakPreset,
            state::{Tick, TimerStatus},
        },
        utils::{clock::AnchoredClock, logging::TEST_LOGGING},
    };

    impl SessionSink for Vec<Session> {
        async fn session_ended(&mut self, session: Session) {
            self.push(session);
        }
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 5, 9, 0, 0).unwrap()
    }

    fn controller(preset: BreakPreset) -> TimerController<Vec<Session>> {
        TimerController::new(
            vec![],
            Box::new(Silent),
            Box::new(AnchoredClock::new(start_time())),
            preset,
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("b".parse::<TimerCommand>().unwrap(), TimerCommand::Break);
        assert_eq!(" Resume\n".parse::<TimerCommand>().unwrap(), TimerCommand::Focus);
        assert_eq!("q".parse::<TimerCommand>().unwrap(), TimerCommand::Quit);
        assert!("later".parse::<TimerCommand>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_schedule_follows_status() {
        let mut controller = controller(BreakPreset::Default);
        assert_eq!(controller.next_tick(), None);

        controller.start_session();
        let first = controller.next_tick().unwrap();
        assert_eq!(controller.tick(), Tick::Counted);
        assert_eq!(controller.next_tick(), Some(first + Duration::from_secs(1)));

        tokio::time::advance(Duration::from_millis(400)).await;
        controller.start_break();
        let rearmed = controller.next_tick().unwrap();
        assert_eq!(rearmed - first, Duration::from_millis(400));

        controller.end_session().await;
        assert_eq!(controller.next_tick(), None);
        assert_eq!(controller.tick(), Tick::Idle);
        assert_eq!(controller.sink().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_end_reaches_sink() {
        let mut controller = controller(BreakPreset::Preset3);
        controller.start_session();
        let session = controller.end_session().await.unwrap();

        assert_eq!(session.total_focus_time, 0);
        assert_eq!(session.focus_periods.len(), 1);
        assert!(session.break_periods.is_empty());
        assert_eq!(controller.into_sink(), vec![session]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_while_stopped_still_cues() {
        let mut cues = MockCuePlayer::new();
        cues.expect_play()
            .with(eq(Cue::SessionEnd))
            .times(1)
            .returning(|_| Ok(()));
        let mut controller = TimerController::new(
            Vec::<Session>::new(),
            Box::new(cues),
            Box::new(AnchoredClock::new(start_time())),
            BreakPreset::Default,
        );

        assert_eq!(controller.end_session().await, None);
        assert!(controller.sink().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_command_while_stopped_still_cues() {
        let mut cues = MockCuePlayer::new();
        let mut sequence = mockall::Sequence::new();
        for cue in [Cue::FocusStart, Cue::SessionEnd, Cue::SessionEnd] {
            cues.expect_play()
                .with(eq(cue))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(()));
        }
        let mut controller = TimerController::new(
            Vec::<Session>::new(),
            Box::new(cues),
            Box::new(AnchoredClock::new(start_time())),
            BreakPreset::Default,
        );

        controller.apply(TimerCommand::Start).await;
        controller.apply(TimerCommand::End).await;
        controller.apply(TimerCommand::End).await;
        controller.apply(TimerCommand::Quit).await;

        assert_eq!(controller.state().status(), TimerStatus::Stopped);
        assert_eq!(controller.sink().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cue_failures_do_not_block_transitions() {
        let mut cues = MockCuePlayer::new();
        cues.expect_play()
            .returning(|_| Err(anyhow::anyhow!("no audio device")));
        let mut controller = TimerController::new(
            Vec::<Session>::new(),
            Box::new(cues),
            Box::new(AnchoredClock::new(start_time())),
            BreakPreset::Default,
        );

        controller.start_session();
        controller.start_break();
        assert_eq!(controller.state().status(), TimerStatus::Break);
        controller.resume_focus();
        assert_eq!(controller.state().status(), TimerStatus::Focus);
        assert!(controller.end_session().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cues_follow_transitions() {
        let mut cues = MockCuePlayer::new();
        let mut sequence = mockall::Sequence::new();
        for cue in [Cue::FocusStart, Cue::BreakStart, Cue::FocusStart, Cue::SessionEnd] {
            cues.expect_play()
                .with(eq(cue))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(()));
        }
        let mut controller = TimerController::new(
            Vec::<Session>::new(),
            Box::new(cues),
            Box::new(AnchoredClock::new(start_time())),
            BreakPreset::Default,
        );

        controller.start_session();
        controller.start_break();
        controller.start_break();
        controller.resume_focus();
        controller.end_session().await;
    }

    /// Ten minutes of focus under preset 3 earn a five minute break that runs out on its own.
    #[tokio::test(start_paused = true)]
    async fn test_run_resumes_after_capped_break() -> Result<()> {
        *TEST_LOGGING;
        let mut controller = controller(BreakPreset::Preset3);
        let (sender, receiver) = mpsc::channel(4);

        let script = tokio::spawn(async move {
            let steps = [
                (0, TimerCommand::Start),
                (600, TimerCommand::Break),
                (400, TimerCommand::End),
                (0, TimerCommand::Quit),
            ];
            for (wait, command) in steps {
                if wait > 0 {
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                sender.send(command).await?;
            }
            anyhow::Ok(())
        });

        let mut statuses = vec![];
        controller
            .run(
                ReceiverStream::new(receiver),
                CancellationToken::new(),
                |state| {
                    if statuses.last() != Some(&state.status()) {
                        statuses.push(state.status());
                    }
                },
            )
            .await?;
        script.await??;

        assert_eq!(
            statuses,
            vec![
                TimerStatus::Stopped,
                TimerStatus::Focus,
                TimerStatus::Break,
                TimerStatus::Focus,
                TimerStatus::Stopped
            ]
        );

        let sessions = controller.into_sink();
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        let focus = session
            .focus_periods
            .iter()
            .map(|v| v.duration)
            .collect::<Vec<_>>();
        let rest = session
            .break_periods
            .iter()
            .map(|v| v.duration)
            .collect::<Vec<_>>();
        assert_eq!(focus, vec![600, 100]);
        assert_eq!(rest, vec![300]);
        assert_eq!(session.total_focus_time, 700);
        assert_eq!(session.total_break_time, 300);
        assert_eq!(session.start_time, start_time());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_running_session() -> Result<()> {
        let mut controller = controller(BreakPreset::Default);
        controller.start_session();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();

        let (_sender, receiver) = mpsc::channel::<TimerCommand>(1);
        let mut ticks = 0;
        let (result, _) = tokio::join!(
            controller.run(ReceiverStream::new(receiver), shutdown, |state| {
                ticks = ticks.max(state.total_focus())
            }),
            async {
                tokio::time::sleep(Duration::from_millis(42_500)).await;
                trigger.cancel();
            }
        );
        result?;

        assert_eq!(ticks, 42);
        let sessions = controller.into_sink();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].total_focus_time, 42);
        Ok(())
    }
}
