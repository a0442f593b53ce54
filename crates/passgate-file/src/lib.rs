//! passgate-file - Filesystem-backed session store.

mod store;

pub use store::FileStore;
