//! Parachain consensus driver.
//!
//! Keeps parachain block production in step with the main chain: main chain sequence events
//! feed a transaction cache, cached transactions are packed into local blocks, and main chain
//! reverts rewrite the local blocks which depended on them.

pub use crate::core::builder::ParachainStarter;
pub use crate::core::parachain::Parachain;
pub use crate::core::shutdown::ShutdownHandle;
pub use crate::utilities::hash::Hash;

pub mod block;
pub mod chain;
pub mod cli;
pub mod config;
mod core;
pub mod logging;
pub mod mainchain;
pub mod sequence;
pub mod storage;
mod utilities;

#[cfg(test)]
mod test_utils;
