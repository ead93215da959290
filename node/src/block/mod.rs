//! # Blocks
//!
//! Parachain blocks carry transactions taken from main chain blocks. The main chain decides
//! which transactions exist and in which order, the parachain only packs them.
//!
//! ## Transaction cache
//!
//! Transactions admitted from main chain `Add` events wait in [`cache::TxCache`], tagged with
//! the sequence number of the event. Producer reads a batch, and removes it only after the block
//! with the batch has been committed. A failed commit leaves the batch in place for the next tick.
//!
//! ## Blocked sequence
//!
//! [`watermark::BlockedSeqTracker`] remembers the highest sequence whose transactions made it into
//! a committed local block. It is persisted, so after restart reconciliation resumes right after it.
//!
//! ## Reverts
//!
//! When the main chain reverts a block, its transactions are removed from the cache. Those already
//! committed locally force the local chain to be rewritten from the lowest affected height: the
//! reconciler waits until the cache is empty, then builds new blocks from the surviving
//! transactions on top of the last unaffected block.
//!
//! ## Empty blocks
//!
//! If nothing is packed for a while and the node lags behind the main chain by more than a
//! threshold, the producer commits an empty block. It copies its parent's state.

pub mod cache;
pub mod manager;
pub mod producer;
pub mod types;
pub mod watermark;
