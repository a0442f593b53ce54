//! Core passgate types.
//!
//! These types enforce their invariants at construction time, so a value
//! that exists is a value that can be sent to the API.

mod api_url;
mod session;

pub use api_url::ApiUrl;
pub use session::{Session, UserInfo};
