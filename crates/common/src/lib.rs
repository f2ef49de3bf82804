//! Common utilities and types shared across unitypack crates.

pub mod error;
pub mod hash;
pub mod timestamp;

pub use error::{Error, PathContext, Result};
pub use timestamp::Timestamp;
