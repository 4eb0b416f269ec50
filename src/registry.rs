//! Session registry: one independently lockable `Session` per session id.
//!
//! The outer map lock is held only to look up or insert an entry. The
//! per-session mutex is held for a whole message cycle, which serializes
//! cycles of the same session while distinct sessions run concurrently.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

use crate::session::Session;

pub const DEFAULT_SESSION_ID: &str = "default";

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    /// Existing session, if this id was ever set up.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Existing session or a fresh uninitialized one.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(s) = self.get(id).await {
            return s;
        }
        let mut sessions = self.sessions.write().await;
        let live = sessions.len();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(target: "session", session_id = %id, live = live + 1, "Session created");
                Arc::new(Mutex::new(Session::default()))
            })
            .clone()
    }
}
