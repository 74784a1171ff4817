//! Two-party round protocol: messages, the per-player state machine and the
//! async driver that runs it over a transport.

pub mod card_ranking;
pub mod game_phases;
pub mod messages;
pub mod round;
pub mod session;
pub mod transport;

pub use card_ranking::*;
pub use game_phases::*;
pub use messages::*;
pub use round::*;
pub use session::*;
pub use transport::*;
