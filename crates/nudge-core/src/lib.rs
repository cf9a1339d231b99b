pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod reminder;
pub mod store;
pub mod types;

pub use error::{NudgeError, Result};
