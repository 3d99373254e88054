//! Session engine: one single-writer actor per connected client.
//!
//! DESIGN
//! ======
//! The actor task owns `SessionState` and drains an mpsc mailbox, applying
//! each `SessionAction` through the pure reducer in arrival order. After
//! every successful apply it
//! - publishes the new snapshot on a `watch` channel (what the socket
//!   renders), and
//! - broadcasts `Applied { action, state }` to the epics.
//!
//! Epics are tokio tasks that turn applied intents into store or HTTP calls
//! and dispatch the results back into the mailbox. They hold only a weak
//! sender, so dropping the last `SessionHandle` closes the mailbox, ends the
//! actor, and closes the applied broadcast the epics are reading.
//!
//! LIFECYCLE
//! =========
//! 1. `spawn_session` → actor + epics running, state idle
//! 2. Socket sends actions via `SessionHandle::send`
//! 3. Socket drops `Session` → every task is aborted

pub mod action;
mod epics;
pub mod reducer;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use action::{HistoryCommand, IconAction, NotifyAction, SessionAction, StoryAction};
pub use reducer::{RequestStatus, SessionError, SessionState};

use self::reducer::reduce;
use crate::config::SessionConfig;
use crate::frame::now_ms;
use crate::services::story::StoryStore;
use crate::services::token::TokenSource;

const APPLIED_CAPACITY: usize = 256;

/// One successfully applied action and the state right after it.
#[derive(Debug, Clone)]
pub struct Applied {
    pub action: SessionAction,
    pub state: Arc<SessionState>,
}

struct Envelope {
    action: SessionAction,
    reply: Option<oneshot::Sender<Result<(), SessionError>>>,
}

/// Remote collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn StoryStore>,
    pub tokens: Option<Arc<dyn TokenSource>>,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    mailbox: mpsc::Sender<Envelope>,
    state: watch::Receiver<Arc<SessionState>>,
}

impl SessionHandle {
    /// Apply `action` and wait for the reducer's verdict.
    ///
    /// # Errors
    ///
    /// Returns the reducer error, or `Closed` if the actor is gone.
    pub async fn send(&self, action: impl Into<SessionAction>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Envelope { action: action.into(), reply: Some(reply) })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Queue `action` without waiting for it to be applied.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the actor is gone.
    pub async fn dispatch(&self, action: impl Into<SessionAction>) -> Result<(), SessionError> {
        self.mailbox
            .send(Envelope { action: action.into(), reply: None })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<SessionState> {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every applied action.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<SessionState>> {
        self.state.clone()
    }
}

/// Mailbox access for epics. Does not keep the actor alive.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    mailbox: mpsc::WeakSender<Envelope>,
}

impl Dispatcher {
    pub(crate) async fn dispatch(&self, action: impl Into<SessionAction>) {
        let action = action.into();
        let Some(mailbox) = self.mailbox.upgrade() else {
            debug!(action = action.type_name(), "session: dispatch after close dropped");
            return;
        };
        if mailbox.send(Envelope { action, reply: None }).await.is_err() {
            debug!("session: mailbox closed during dispatch");
        }
    }

    /// Report a failed request: the failure action plus a user-visible
    /// notification carrying the message.
    pub(crate) async fn fail(&self, failed: impl Into<SessionAction>, message: String) {
        self.dispatch(failed).await;
        self.dispatch(SessionAction::notify(message)).await;
    }
}

// =============================================================================
// SPAWN
// =============================================================================

/// A running session. Dropping it aborts the actor and every epic.
pub struct Session {
    handle: SessionHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Start the actor and its epics for `user_id`.
#[must_use]
pub fn spawn_session(user_id: impl Into<String>, deps: SessionDeps, config: SessionConfig) -> Session {
    let user_id = user_id.into();
    let initial = SessionState::new(user_id.clone());

    let (mailbox, inbox) = mpsc::channel(config.mailbox_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(Arc::new(initial.clone()));
    let (applied_tx, _) = broadcast::channel(APPLIED_CAPACITY);

    let dispatcher = Dispatcher { mailbox: mailbox.downgrade() };
    // Epic receivers are created before the actor runs so none miss the
    // first applied action.
    let mut tasks = epics::spawn_all(&applied_tx, &dispatcher, &deps, config);
    tasks.push(tokio::spawn(run_actor(initial, inbox, state_tx, applied_tx)));

    info!(%user_id, "session: started");
    Session { handle: SessionHandle { mailbox, state: state_rx }, tasks }
}

async fn run_actor(
    mut state: SessionState,
    mut inbox: mpsc::Receiver<Envelope>,
    state_tx: watch::Sender<Arc<SessionState>>,
    applied_tx: broadcast::Sender<Applied>,
) {
    while let Some(Envelope { action, reply }) = inbox.recv().await {
        let result = reduce(&mut state, &action, now_ms());
        match &result {
            Ok(()) => {
                let snapshot = Arc::new(state.clone());
                state_tx.send_replace(snapshot.clone());
                let _ = applied_tx.send(Applied { action, state: snapshot });
            }
            Err(e) => debug!(action = action.type_name(), error = %e, "session: action rejected"),
        }
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }
    info!(user_id = %state.user_id, "session: stopped");
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
