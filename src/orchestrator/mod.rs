//! Application-level orchestration.
//!
//! The controller owns the session for its whole lifetime and serialises every transition.
//! UI/CLI layers talk to it only through commands and events.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
