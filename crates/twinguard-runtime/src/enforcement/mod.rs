//! Authorization of Thing commands.
//!
//! # Decision Flow
//!
//! ```text
//! ThingCommand
//!     │
//!     ▼
//! resolve enforcer (id cache → enforcer cache, once per command)
//!     │
//!     ├─ Absent ─────────► upsert? ─► consistency::check ─► creation (self-authorization)
//!     ├─ PolicyMissing ──► ThingNotAccessible / ThingNotModifiable
//!     ├─ Acl ────────────► acl::evaluate     (all-or-nothing)
//!     └─ Policy ─────────► policy::evaluate  (unrestricted for writes, partial for reads)
//!                              │
//!                              ▼
//!          Authorized: read-subjects attached ─► ResponseOrchestrator
//!          Denied:     registry error, never forwarded
//! ```

pub mod acl;
pub mod consistency;
mod coordinator;
mod creation;
pub mod policy;
pub(crate) mod registry;

pub use consistency::CreationSource;
pub use coordinator::{Resolution, ThingEnforcer};

use crate::command::ThingCommand;
use crate::error::ThingError;
use tracing::{debug, warn};
use twinguard_auth::{AuthorizationDecision, Enforcer};

/// A command cleared for forwarding.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// The command, with its read-subjects header set.
    pub command: ThingCommand,
    /// The enforcer that authorized it; `None` for unconditional creation.
    pub enforcer: Option<Enforcer>,
}

/// Turns an evaluator decision into the authorized command or the
/// registry error for it.
pub(crate) fn apply_decision(
    command: ThingCommand,
    decision: AuthorizationDecision,
    enforcer: Option<Enforcer>,
) -> Result<Authorized, ThingError> {
    match decision {
        AuthorizationDecision::Authorized { read_subjects } => {
            debug!(
                thing_id = %command.thing_id,
                correlation_id = %command.headers.correlation_id,
                command = command.name(),
                read_subjects = read_subjects.len(),
                "Command authorized"
            );
            Ok(Authorized {
                command: command.with_read_subjects(read_subjects),
                enforcer,
            })
        }
        AuthorizationDecision::Denied { reason } => {
            warn!(
                thing_id = %command.thing_id,
                correlation_id = %command.headers.correlation_id,
                command = command.name(),
                %reason,
                "Command denied"
            );
            Err(registry::not_authorized(&command))
        }
    }
}
