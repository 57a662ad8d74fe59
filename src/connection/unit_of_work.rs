//! Thread-bound session scoping.
//!
//! A [`UnitOfWork`] hands every thread its own session from a
//! [`SessionFactory`] and keeps returning that same session until the unit of
//! work ends. Components that need "the current session" (the transaction
//! controller, sequence refills) take the unit of work as their
//! [`SessionProvider`] instead of reaching for a global.

use super::{SessionFactory, SessionProvider, StorageSession};
use crate::core::{PersistError, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Level, event};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static BOUND_SESSIONS: RefCell<HashMap<u64, Arc<dyn StorageSession>>> =
        RefCell::new(HashMap::new());
}

pub struct UnitOfWork {
    id: u64,
    factory: Arc<dyn SessionFactory>,
}

impl UnitOfWork {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            id: NEXT_UNIT_ID.fetch_add(1, Ordering::SeqCst),
            factory,
        }
    }

    /// Open a session and bind it to the calling thread.
    pub fn begin(&self) -> Result<Arc<dyn StorageSession>> {
        if self.is_active() {
            return Err(PersistError::StorageError(
                "Unit of work already begun on this thread".into(),
            ));
        }

        let session = self.factory.open_session()?;
        BOUND_SESSIONS.with(|bound| bound.borrow_mut().insert(self.id, session.clone()));
        event!(Level::TRACE, unit = self.id, "unit of work begun");
        Ok(session)
    }

    /// Unbind the calling thread's session. No-op when nothing is bound.
    ///
    /// The session is released here; an uncommitted transaction on it is
    /// rolled back once the last handle goes away.
    pub fn end(&self) {
        let released = BOUND_SESSIONS.with(|bound| bound.borrow_mut().remove(&self.id));
        if released.is_some() {
            event!(Level::TRACE, unit = self.id, "unit of work ended");
        }
    }

    pub fn is_active(&self) -> bool {
        BOUND_SESSIONS.with(|bound| bound.borrow().contains_key(&self.id))
    }

    /// Begin a unit of work that ends when the returned guard drops.
    pub fn scope(&self) -> Result<UnitOfWorkScope<'_>> {
        let session = self.begin()?;
        Ok(UnitOfWorkScope { unit: self, session })
    }
}

impl SessionProvider for UnitOfWork {
    /// The bound session, beginning a unit of work on first use.
    fn current_session(&self) -> Result<Arc<dyn StorageSession>> {
        let bound = BOUND_SESSIONS.with(|bound| bound.borrow().get(&self.id).cloned());
        match bound {
            Some(session) => Ok(session),
            None => self.begin(),
        }
    }

    fn release_current(&self) {
        self.end();
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.end();
    }
}

/// RAII guard returned by [`UnitOfWork::scope`].
pub struct UnitOfWorkScope<'a> {
    unit: &'a UnitOfWork,
    session: Arc<dyn StorageSession>,
}

impl UnitOfWorkScope<'_> {
    pub fn session(&self) -> &Arc<dyn StorageSession> {
        &self.session
    }
}

impl Drop for UnitOfWorkScope<'_> {
    fn drop(&mut self) {
        self.unit.end();
    }
}
