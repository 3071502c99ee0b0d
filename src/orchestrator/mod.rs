//! Application-level orchestration utilities.
//!
//! This module owns the workflow lifecycle: submissions in flight, the stored
//! session, stale-response gating, and artifact downloads. UI/CLI layers call
//! into this module to keep responsibilities separated.

mod controller;

pub(crate) use controller::{run_controller, UiCommand};
