//! Reference model for model-based testing.
//!
//! The model is a deliberately naive rendition of room admission. It knows
//! nothing about components or stores; it tracks the inputs a flush would see
//! and re-derives the outcome from the rules.
//!
//! # Design Principles
//!
//! - Obviously correct: every rule is one `if` in [`ModelWorld::flush`]
//! - Deterministic: same operations, same states

pub mod operation;
mod world;

pub use operation::{Operation, room_name};
pub use world::{ModelRoom, ModelWorld, ObservableState};
