//! Forwarding authorized commands and shaping their responses.
//!
//! Queries are asked with a timeout and their responses are filtered down
//! to what the requester may read. Modify commands are forwarded; the
//! persistence worker answers the requester directly unless the command
//! may change which enforcer governs the Thing, in which case the answer
//! is relayed so the enforcer caches can be invalidated first.

mod ask;
mod orchestrator;

pub use ask::{ask, AskOutcome};
pub use orchestrator::ResponseOrchestrator;
