//! The session timer. [state::TimerState] is the pure FOCUS/BREAK state machine,
//! [controller::TimerController] drives it with a clock, a tick schedule and side effects, and
//! [policy] decides how long breaks last.

pub mod controller;
pub mod cue;
pub mod policy;
pub mod state;
