pub mod config;
pub mod crypto_serde;
pub mod dealing;
pub mod error;
pub mod game;
pub mod shuffling;
pub mod tokio_tools;

#[cfg(test)]
pub mod test_utils;

pub use error::{AbortReason, PlayerId, ProtocolError};
pub use shuffling::*;
