use crate::connection::{SessionProvider, StorageSession};
use crate::core::{PersistError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// Transaction state of the ambient session.
///
/// ```text
/// Inactive ──begin──> Active
///    ^                  │
///    └─commit/rollback──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Inactive,
    Active,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Inactive => write!(f, "INACTIVE"),
            TransactionState::Active => write!(f, "ACTIVE"),
        }
    }
}

/// Transaction boundary controller over the session a provider resolves.
#[derive(Clone)]
pub struct Transactions {
    provider: Arc<dyn SessionProvider>,
}

impl Transactions {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// The session transactions are demarcated on.
    pub fn session(&self) -> Result<Arc<dyn StorageSession>> {
        self.provider.current_session()
    }

    pub fn state(&self) -> Result<TransactionState> {
        Ok(state_of(self.session()?.as_ref()))
    }

    pub fn in_transaction(&self) -> Result<bool> {
        Ok(self.state()? == TransactionState::Active)
    }

    pub fn require_in_transaction(&self) -> Result<()> {
        if !self.in_transaction()? {
            return Err(PersistError::TransactionStateError(
                "Expected an active transaction".into(),
            ));
        }
        Ok(())
    }

    pub fn require_not_in_transaction(&self) -> Result<()> {
        if self.in_transaction()? {
            return Err(PersistError::TransactionStateError(
                "Unexpected active transaction".into(),
            ));
        }
        Ok(())
    }

    /// Run `work` inside a transaction.
    ///
    /// Joins the active transaction if there is one, leaving commit and
    /// rollback to whoever began it. Otherwise begins a transaction, commits
    /// when `work` returns `Ok` and rolls back when it returns `Err` or
    /// panics. The error `work` returned is handed back unchanged.
    pub fn run_in_transaction<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&dyn StorageSession) -> std::result::Result<T, E>,
        E: From<PersistError>,
    {
        let session = self.session()?;
        if session.is_transaction_active() {
            event!(Level::TRACE, "joining active transaction");
            return work(session.as_ref());
        }

        session.begin_transaction()?;
        event!(Level::DEBUG, "transaction begun");

        let guard = RollbackOnUnwind::new(session.as_ref());
        let outcome = work(session.as_ref());
        guard.disarm();

        match outcome {
            Ok(value) => {
                if let Err(err) = session.commit() {
                    event!(Level::WARN, error = %err, "commit failed, rolling back");
                    if let Err(rollback_err) = session.rollback() {
                        event!(
                            Level::WARN,
                            error = %rollback_err,
                            "rollback after failed commit failed"
                        );
                    }
                    return Err(err.into());
                }
                event!(Level::DEBUG, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                match session.rollback() {
                    Ok(()) => event!(Level::WARN, "transaction rolled back after failure"),
                    Err(rollback_err) => event!(
                        Level::WARN,
                        error = %rollback_err,
                        "rollback after failure failed"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Like [`run_in_transaction`](Self::run_in_transaction), but refuses to
    /// join: `work` never runs if a transaction is already active.
    pub fn run_in_new_transaction<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&dyn StorageSession) -> std::result::Result<T, E>,
        E: From<PersistError>,
    {
        self.require_not_in_transaction()?;
        self.run_in_transaction(work)
    }
}

impl fmt::Debug for Transactions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transactions").finish_non_exhaustive()
    }
}

fn state_of(session: &dyn StorageSession) -> TransactionState {
    if session.is_transaction_active() {
        TransactionState::Active
    } else {
        TransactionState::Inactive
    }
}

/// Rolls the transaction back if dropped while still armed, which only
/// happens when `work` unwinds.
struct RollbackOnUnwind<'a> {
    session: &'a dyn StorageSession,
    armed: bool,
}

impl<'a> RollbackOnUnwind<'a> {
    fn new(session: &'a dyn StorageSession) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            event!(Level::WARN, "transaction rolled back during unwind");
            let _ = self.session.rollback();
        }
    }
}
