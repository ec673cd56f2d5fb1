//! Terminal focus timer following the Flowtime technique: focus for as long as it lasts, then
//! take a break sized from that focus. Finished sessions are kept locally with per-day totals,
//! can be browsed by day or hour and moved between machines as csv.
//!

pub mod cli;
pub mod interchange;
pub mod report;
pub mod store;
pub mod timer;
pub mod utils;
