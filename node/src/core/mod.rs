pub(crate) mod builder;
pub mod context;
pub(crate) mod parachain;
pub(crate) mod shutdown;
