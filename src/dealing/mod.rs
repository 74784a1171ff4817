//! Card retrieval from the jointly shuffled deck and verifiable showdown openings.

pub mod draw;
pub mod open;

pub use draw::*;
pub use open::*;
