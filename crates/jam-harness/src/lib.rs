//! Model-based testing harness for Jam room admission.
//!
//! Admission is the part of a session with the most interacting inputs:
//! room selection, the joined-room history, one-shot auto-join requests and
//! rooms that load, close or get reloaded at arbitrary times.
//!
//! # Model-Based Testing
//!
//! The [`model`] module holds a reference implementation written directly
//! from the admission rules. [`JamWorld`] drives a real [`jam_app::Jam`]
//! through the same [`Operation`]s, and both expose an [`ObservableState`]
//! after every flush for comparison.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod real;

pub use model::{ModelRoom, ModelWorld, ObservableState, Operation, room_name};
pub use real::JamWorld;
