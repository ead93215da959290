//! Main chain sequence reconciliation.
//!
//! The main chain keeps an append only log of block events. Every event has a sequence number,
//! starting from 0, and is either an `Add` (block appended) or a `Del` (block reverted).
//! Reconciler replays the log one sequence at a time: added blocks feed the transaction cache,
//! reverted blocks un-admit cached transactions and rewrite the local block which already
//! included some of them.

pub(crate) mod reconciler;
pub mod types;
