//! In-process events.
//!
//! Two mechanisms live here:
//!
//! - The **rename bridge**: the root node's name and the mind-map's name
//!   must stay equal, but the two sides live in different services. Each
//!   service publishes a rename event and subscribes to the other's;
//!   handlers run synchronously inside the publisher's critical section,
//!   so the pair is atomic with respect to external observers. Handlers
//!   perform plain (non-publishing) updates, which breaks the cycle — a
//!   handler never re-emits.
//! - The **user event channel**: `UserDeleted` is delivered over an
//!   unbounded channel to any interested subscriber after the store
//!   cascade completes. No core service currently reacts; the hook is
//!   retained for cleanup tooling.

use std::sync::{Mutex, RwLock};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::error::{Error, Result};
use crate::mindmap::state::MindmapState;
use crate::store::SqliteStore;
use crate::types::MindmapId;
use crate::user::types::User;

/// A name-synchronization event between a mind-map row and its root node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameEvent {
    /// The mind-map row was renamed; the root node must follow.
    MindmapRenamed {
        /// The renamed mind-map.
        id: MindmapId,
        /// The new name.
        name: String,
    },
    /// The root node was renamed; the mind-map row must follow.
    RootNodeRenamed {
        /// The mind-map whose root changed.
        id: MindmapId,
        /// The new name.
        name: String,
    },
}

/// A user lifecycle event.
#[derive(Clone, Debug)]
pub enum UserEvent {
    /// A user was deleted, after the store cascade removed their
    /// mind-maps.
    UserDeleted {
        /// The deleted user.
        user: User,
    },
}

/// Handler for rename events.
///
/// Runs under the publisher's per-mind-map exclusion with the store and
/// the locked state in hand; must not publish further events.
pub type RenameHandler =
    Box<dyn Fn(&RenameEvent, &SqliteStore, &mut MindmapState) -> Result<()> + Send + Sync>;

/// The in-process event bus.
pub struct EventBus {
    rename_handlers: RwLock<Vec<RenameHandler>>,
    user_subscribers: Mutex<Vec<Sender<UserEvent>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.rename_handlers.read().map(|h| h.len()).unwrap_or(0);
        let subscribers = self.user_subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("EventBus")
            .field("rename_handlers", &handlers)
            .field("user_subscribers", &subscribers)
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with no handlers or subscribers.
    pub fn new() -> Self {
        Self {
            rename_handlers: RwLock::new(Vec::new()),
            user_subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a rename handler. Handlers run in registration order.
    pub fn subscribe_rename(&self, handler: RenameHandler) {
        if let Ok(mut handlers) = self.rename_handlers.write() {
            handlers.push(handler);
        }
    }

    /// Dispatches a rename event synchronously to every handler.
    ///
    /// Runs within the calling operation's critical section: the caller
    /// already holds the mind-map's exclusive lock, so handlers see and
    /// mutate a consistent state.
    pub fn publish_rename(
        &self,
        event: &RenameEvent,
        store: &SqliteStore,
        state: &mut MindmapState,
    ) -> Result<()> {
        let handlers = self
            .rename_handlers
            .read()
            .map_err(|_| Error::io("event bus lock poisoned"))?;
        for handler in handlers.iter() {
            handler(event, store, state)?;
        }
        debug!(?event, "Rename event dispatched");
        Ok(())
    }

    /// Returns a receiver for user lifecycle events.
    pub fn subscribe_users(&self) -> Receiver<UserEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.user_subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Delivers a user event to every live subscriber, pruning
    /// disconnected ones.
    pub fn publish_user(&self, event: UserEvent) {
        if let Ok(mut subscribers) = self.user_subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
