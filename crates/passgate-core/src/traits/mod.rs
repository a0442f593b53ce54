//! Seams between the client and its host environment.

mod navigator;
mod store;

pub use navigator::{LoggingNavigator, Navigator, RecordingNavigator};
pub use store::KeyValueStore;
