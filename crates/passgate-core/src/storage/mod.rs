//! Session persistence.
//!
//! [`SessionStorage`] maps a [`Session`](crate::Session) onto three keys of a
//! [`KeyValueStore`](crate::KeyValueStore); [`MemoryStore`] is the
//! process-local backend.

mod memory;
mod session;

pub use memory::MemoryStore;
pub use session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStorage, USER_KEY};
