//! Actions dispatched by the public API.

use jam_core::ActionType;

/// Enter the room given as payload, or leave with a `null` payload.
pub const JOIN: ActionType = ActionType::new("JOIN");
/// Step down from the stage while staying in the room.
pub const LEAVE_STAGE: ActionType = ActionType::new("LEAVE_STAGE");
/// Broadcast a reaction to the room.
pub const REACTION: ActionType = ActionType::new("REACTION");
/// Ask for microphone access again.
pub const RETRY_MIC: ActionType = ActionType::new("RETRY_MIC");
/// Resume remote audio playback.
pub const RETRY_AUDIO: ActionType = ActionType::new("RETRY_AUDIO");
/// Join the selected room once its data is available.
pub const AUTO_JOIN: ActionType = ActionType::new("AUTO_JOIN");
