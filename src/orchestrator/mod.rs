//! Application-level orchestration.
//!
//! This module owns the run lifecycle (start/stop), the elapsed-time ticker and the
//! final report of a run. UI/CLI layers only send commands in and read events out.

mod controller;
mod post_process;
mod timer;

pub(crate) use controller::{run_controller, UiCommand};
