//! Cancellation scopes and the deadline binder.
//!
//! A [`Scope`] is a read-only view of "should this work stop?". It becomes
//! cancelled when its owner cancels or releases it, when its deadline passes,
//! or when any ancestor scope is cancelled. Cancellation only flows from parent
//! to child: a child holds no handle capable of cancelling its parent.
//!
//! A [`ScopeHandle`] owns a scope. Dropping the handle releases the scope and
//! marks it cancelled, so every exit path of the owner (return, `?`, panic,
//! future dropped by a disconnecting client) releases it.

use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Why a scope stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The owner cancelled or released the scope (e.g. client disconnect).
    Cancelled,
    /// The scope's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => f.write_str("cancelled"),
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Observable cancellation state handed to units of work.
#[derive(Debug, Clone)]
pub struct Scope {
    state: watch::Receiver<Option<CancelCause>>,
    deadline: Option<Instant>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// A scope that is never cancelled.
    pub fn background() -> Self {
        let (_, state) = watch::channel(None);
        Self {
            state,
            deadline: None,
            parent: None,
        }
    }

    /// The instant this scope expires, already clamped to every ancestor's.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why this scope is cancelled, or `None` while it is live.
    ///
    /// An explicit cancellation wins over an elapsed deadline, which wins over
    /// an ancestor's cause.
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = *self.state.borrow() {
            return Some(cause);
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Some(CancelCause::DeadlineExceeded);
        }
        self.parent.as_ref().and_then(|parent| parent.cause())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolve once the scope is cancelled, yielding the cause.
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = CancelCause> + Send + '_>> {
        Box::pin(async move {
            if let Some(cause) = self.cause() {
                return cause;
            }

            let mut state = self.state.clone();
            let explicit = async move {
                loop {
                    let current = *state.borrow_and_update();
                    if let Some(cause) = current {
                        return cause;
                    }
                    if state.changed().await.is_err() {
                        // Owner gone without cancelling: only deadline or parent remain.
                        return std::future::pending::<CancelCause>().await;
                    }
                }
            };
            let expired = async {
                match self.deadline {
                    Some(deadline) => {
                        time::sleep_until(deadline).await;
                        CancelCause::DeadlineExceeded
                    }
                    None => std::future::pending().await,
                }
            };
            let inherited = async {
                match &self.parent {
                    Some(parent) => parent.cancelled().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cause = explicit => cause,
                cause = expired => cause,
                cause = inherited => cause,
            }
        })
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::background()
    }
}

/// Owner of a [`Scope`]. Cancels the scope when dropped.
#[derive(Debug)]
pub struct ScopeHandle {
    trigger: watch::Sender<Option<CancelCause>>,
    scope: Scope,
}

impl ScopeHandle {
    /// A new root scope with an optional timeout counted from now.
    pub fn root(timeout: Option<Duration>) -> Self {
        let (trigger, state) = watch::channel(None);
        Self {
            trigger,
            scope: Scope {
                state,
                deadline: timeout.map(deadline_after),
                parent: None,
            },
        }
    }

    /// Deadline binder: derive a scope from `parent` that is cancelled at
    /// `min(parent deadline, now + timeout)` or whenever `parent` is cancelled.
    ///
    /// Binding never fails. A parent that is already cancelled, or a zero
    /// timeout, produces a scope that is cancelled from the start.
    pub fn bind(parent: &Scope, timeout: Duration) -> Self {
        let own = deadline_after(timeout);
        let deadline = match parent.deadline {
            Some(inherited) => inherited.min(own),
            None => own,
        };
        let (trigger, state) = watch::channel(None);
        Self {
            trigger,
            scope: Scope {
                state,
                deadline: Some(deadline),
                parent: Some(Arc::new(parent.clone())),
            },
        }
    }

    /// The owned scope; clone it to hand to other components.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Cancel the scope now. Has no effect if it is already cancelled.
    pub fn cancel(&self) {
        self.settle(CancelCause::Cancelled);
    }

    fn settle(&self, cause: CancelCause) {
        self.trigger.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(cause);
                true
            } else {
                false
            }
        });
    }
}

impl Deref for ScopeHandle {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        let cause = self.scope.cause().unwrap_or(CancelCause::Cancelled);
        self.settle(cause);
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or(now + Duration::from_secs(86_400 * 365))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_cancelled() {
        let scope = Scope::background();
        assert_eq!(scope.cause(), None);
        assert!(scope.deadline().is_none());
    }

    #[tokio::test]
    async fn zero_timeout_is_expired_at_birth() {
        let bound = ScopeHandle::bind(&Scope::background(), Duration::ZERO);
        assert_eq!(bound.cause(), Some(CancelCause::DeadlineExceeded));
        assert_eq!(bound.cancelled().await, CancelCause::DeadlineExceeded);
    }

    #[tokio::test]
    async fn deadline_fires() {
        let bound = ScopeHandle::bind(&Scope::background(), Duration::from_millis(20));
        assert!(!bound.is_cancelled());
        let cause = tokio::time::timeout(Duration::from_secs(2), bound.cancelled())
            .await
            .expect("deadline should fire");
        assert_eq!(cause, CancelCause::DeadlineExceeded);
    }

    #[test]
    fn derived_deadline_is_min_of_parent_and_timeout() {
        let parent = ScopeHandle::root(Some(Duration::from_millis(50)));
        let child = ScopeHandle::bind(&parent, Duration::from_secs(30));
        assert_eq!(child.deadline(), parent.deadline());

        let short = ScopeHandle::bind(&parent, Duration::from_millis(1));
        assert!(short.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates_down() {
        let parent = ScopeHandle::root(None);
        let child = ScopeHandle::bind(&parent, Duration::from_secs(30));

        let waiter = {
            let scope = child.scope().clone();
            tokio::spawn(async move { scope.cancelled().await })
        };
        parent.cancel();

        assert_eq!(waiter.await.unwrap(), CancelCause::Cancelled);
        assert_eq!(child.cause(), Some(CancelCause::Cancelled));
    }

    #[test]
    fn child_cannot_cancel_parent() {
        let parent = ScopeHandle::root(None);
        let child = ScopeHandle::bind(&parent, Duration::from_secs(30));
        child.cancel();
        drop(child);
        assert_eq!(parent.cause(), None);
    }

    #[test]
    fn already_cancelled_parent_yields_cancelled_child() {
        let parent = ScopeHandle::root(None);
        parent.cancel();
        let child = ScopeHandle::bind(&parent, Duration::from_secs(30));
        assert_eq!(child.cause(), Some(CancelCause::Cancelled));
    }

    #[test]
    fn dropping_handle_releases_scope() {
        let handle = ScopeHandle::root(None);
        let observed = handle.scope().clone();
        assert!(!observed.is_cancelled());
        drop(handle);
        assert_eq!(observed.cause(), Some(CancelCause::Cancelled));
    }

    #[test]
    fn first_cause_sticks() {
        let handle = ScopeHandle::bind(&Scope::background(), Duration::ZERO);
        let observed = handle.scope().clone();
        drop(handle);
        assert_eq!(observed.cause(), Some(CancelCause::DeadlineExceeded));
    }
}
