pub mod chaum_pedersen;
pub mod cipher;
pub mod data_structures;
pub mod deck_codec;
pub mod engine;
pub mod group;
pub mod proof;
pub mod transcript;

pub use chaum_pedersen::ChaumPedersenProof;
pub use cipher::*;
pub use data_structures::*;
pub use deck_codec::*;
pub use engine::*;
pub use proof::*;
pub use transcript::Digest;
