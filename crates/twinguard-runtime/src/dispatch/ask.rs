//! Request/response over a [`PersistenceRouter`] with a deadline.

use crate::command::{ThingCommand, ThingResponse};
use crate::error::{EnforcementError, ThingError};
use crate::worker::PersistenceRouter;
use std::time::Duration;
use tokio::sync::oneshot;

/// Result of [`ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    /// The worker answered successfully.
    Response(ThingResponse),
    /// The worker rejected the command.
    DomainError(ThingError),
    /// No answer within the given duration.
    Timeout(Duration),
    /// Anything else: a dropped reply channel or a non-domain failure.
    Unexpected(String),
}

/// Sends `command` through `router` and waits up to `timeout` for the
/// answer. The deadline covers delivery as well.
pub async fn ask<R>(router: &R, command: ThingCommand, timeout: Duration) -> AskOutcome
where
    R: PersistenceRouter + ?Sized,
{
    let (reply_tx, reply_rx) = oneshot::channel();
    let exchange = async {
        router.forward(command, reply_tx).await;
        reply_rx.await
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(Ok(response))) => AskOutcome::Response(response),
        Ok(Ok(Err(EnforcementError::Thing(e)))) => AskOutcome::DomainError(e),
        Ok(Ok(Err(e))) => AskOutcome::Unexpected(e.to_string()),
        Ok(Err(_)) => AskOutcome::Unexpected("response channel closed".into()),
        Err(_) => AskOutcome::Timeout(timeout),
    }
}
