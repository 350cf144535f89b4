//! Turn and thread lifecycle.
//!
//! - `turn`: per-turn state machine and [`RunResult`](turn::RunResult) aggregation.
//! - `controller`: drives one agent process through a turn; event streaming.
//! - `thread`: the [`Thread`](thread::Thread) session handle.

pub mod controller;
pub mod thread;
pub mod turn;
