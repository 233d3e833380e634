//! Real-time room coordination for two-party debates
//!
//! - [`ConnectionRegistry`]: per-room live membership and fan-out
//! - [`BroadcastRouter`]: inbound message dispatch with sender exclusion
//! - [`RoomCoordinator`]: connection lifecycle (admission, eviction, cleanup)
//! - [`MatchmakingQueue`]: FIFO pairing of anonymous connections

pub mod error;
pub mod events;
pub mod matchmaking;
pub mod registry;
pub mod router;
pub mod session;

pub use error::{Error, Result};
pub use events::{
    ClientMessage, CloseCode, MatchAction, MatchmakingRequest, MatchmakingResponse, Outbound,
    ServerMessage,
};
pub use matchmaking::{MatchOutcome, MatchSender, MatchmakingQueue};
pub use registry::{Admission, ConnectionRegistry, OutboundSender, ROOM_CAPACITY};
pub use router::{BroadcastRouter, SideEffect};
pub use session::{RoomCoordinator, RoomSession, SessionState, SignalStream};
