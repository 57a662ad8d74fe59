// ============================================================================
// Transaction Boundary Module
// ============================================================================
//
// Demarcates units of work on the ambient storage session:
// - run_in_transaction: start or join, commit on success, roll back on failure
// - run_in_new_transaction: refuse to run inside an active transaction
//
// The session model has no nesting or suspension, so there are exactly two
// states per session: Inactive and Active.
//
// ============================================================================

pub mod boundary;

pub use boundary::{TransactionState, Transactions};
