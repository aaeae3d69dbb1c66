//! Session-scoped result storage.
//!
//! Each user session gets a random [`SessionId`] and sees only the reports
//! recorded under it. Nothing here is shared between sessions.
//!
//! Library surface for long-lived front ends that serve several users.
//! The one-shot CLI prints its reports directly and holds no store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use hazard_risk_models::Hazard;
use uuid::Uuid;

use crate::RunReport;

/// Opaque session key.
pub type SessionId = Uuid;

/// Last report per hazard for every open session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<BTreeMap<SessionId, BTreeMap<Hazard, RunReport>>>,
}

impl SessionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new session.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn open(&self) -> SessionId {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .expect("session store lock poisoned")
            .insert(id, BTreeMap::new());
        log::debug!("Opened session {id}");
        id
    }

    /// Stores `report` as the session's latest for its hazard, replacing
    /// the previous one.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn record(&self, session: SessionId, report: RunReport) {
        self.sessions
            .write()
            .expect("session store lock poisoned")
            .entry(session)
            .or_default()
            .insert(report.hazard, report);
    }

    /// The session's latest report for `hazard`.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn latest(&self, session: SessionId, hazard: Hazard) -> Option<RunReport> {
        self.sessions
            .read()
            .expect("session store lock poisoned")
            .get(&session)
            .and_then(|reports| reports.get(&hazard))
            .cloned()
    }

    /// Drops everything recorded for `session`.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn clear(&self, session: SessionId) {
        if self
            .sessions
            .write()
            .expect("session store lock poisoned")
            .remove(&session)
            .is_some()
        {
            log::debug!("Cleared session {session}");
        }
    }

    /// Number of open sessions.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .expect("session store lock poisoned")
            .len()
    }

    /// Whether no session is open.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
