//! Cancellation handle shared between the caller and one in-flight request.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Why a request was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The caller invoked [`AbortHandle::abort`].
    Caller,
    /// The request outlived the configured timeout.
    Timeout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Caller => f.write_str("cancelled by caller"),
            AbortReason::Timeout => f.write_str("request timed out"),
        }
    }
}

/// Abort controller handed to consumers through [`crate::ChatHandler::on_controller`].
///
/// Cloning is cheap and every clone controls the same request. Aborting is idempotent:
/// the first reason recorded wins and later calls are no-ops, so a caller abort racing
/// the timeout still finalizes the request exactly once.
///
/// # Examples
///
/// ```
/// use parley_chat::{AbortHandle, AbortReason};
///
/// let handle = AbortHandle::new();
/// assert!(!handle.is_aborted());
/// handle.abort();
/// handle.abort_with(AbortReason::Timeout);
/// assert_eq!(handle.reason(), Some(AbortReason::Caller));
/// ```
#[derive(Clone)]
pub struct AbortHandle {
    state: Arc<watch::Sender<Option<AbortReason>>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Cancels the request on behalf of the caller.
    pub fn abort(&self) {
        self.abort_with(AbortReason::Caller);
    }

    /// Cancels the request, recording `reason` unless another reason was recorded first.
    ///
    /// Returns `true` when this call performed the transition.
    pub fn abort_with(&self, reason: AbortReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(reason);
                true
            }
        })
    }

    pub fn is_aborted(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        *self.state.borrow()
    }

    /// Resolves once the request has been aborted, yielding the winning reason.
    pub async fn aborted(&self) -> AbortReason {
        let mut rx = self.state.subscribe();
        if let Ok(reason) = rx.wait_for(Option::is_some).await {
            if let Some(reason) = *reason {
                return reason;
            }
        }
        // The sender lives inside `self`, so the channel cannot close while we wait.
        std::future::pending().await
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("reason", &self.reason())
            .finish()
    }
}
