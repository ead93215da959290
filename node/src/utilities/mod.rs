pub(crate) mod backoff;
pub(crate) mod encoding;
pub(crate) mod hash;
pub(crate) mod merkle;
pub(crate) mod time;

pub use hash::Hash;
