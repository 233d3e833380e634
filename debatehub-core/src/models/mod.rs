pub mod id;
pub mod participant;
pub mod room;
pub mod turn;

pub use id::{ConnectionId, RoomCode, ROOM_CODE_MAX_LEN, ROOM_CODE_MIN_LEN};
pub use participant::{IdentityClaims, Participant};
pub use room::{Role, Room};
pub use turn::{RoomEvent, RoomEventKind, Turn};
