//! Jey, the assistant orchestrator: reads the conversation, classifies
//! intent, and emits one message or state-machine action per turn.

pub mod intent;
pub mod orchestrator;
pub mod prompt;

pub use intent::{detect_intent, Command, FollowUpReply, Intent, AGENT_REQUEST_REASON};
pub use orchestrator::{run_turn, TurnOutcome};
