use std::io::Write;

use anyhow::Result;
#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    FocusStart,
    BreakStart,
    SessionEnd,
}

/// Fire-and-forget notification of timer transitions. Errors are only ever logged by the caller.
#[cfg_attr(test, automock)]
pub trait CuePlayer {
    fn play(&mut self, cue: Cue) -> Result<()>;
}

/// Rings the terminal bell, twice when the session ends.
pub struct TerminalBell<W: Write> {
    out: W,
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> CuePlayer for TerminalBell<W> {
    fn play(&mut self, cue: Cue) -> Result<()> {
        let bell: &[u8] = match cue {
            Cue::FocusStart | Cue::BreakStart => b"\x07",
            Cue::SessionEnd => b"\x07\x07",
        };
        self.out.write_all(bell)?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct Silent;

impl CuePlayer for Silent {
    fn play(&mut self, _cue: Cue) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cue, CuePlayer, TerminalBell};

    #[test]
    fn test_bell_per_cue() -> anyhow::Result<()> {
        let mut bell = TerminalBell::new(Vec::new());
        bell.play(Cue::FocusStart)?;
        bell.play(Cue::SessionEnd)?;
        assert_eq!(bell.out, b"\x07\x07\x07");
        Ok(())
    }
}
