pub(crate) mod animations;
pub(crate) mod snapshot;
