//! Signaling protocol
//!
//! ```text
//! Client A                 Relay                  Client B
//!    |-- join r1/a ---------->|                       |
//!    |                        |<--------- join r1/b --|
//!    |<---------- join r1/b --|-- join r1/a --------->|
//!    |-- offer a→b ---------->|-- offer a→b --------->|  (verbatim)
//!    |<-------- answer b→a ---|<-------- answer b→a --|  (verbatim)
//!    |-- leave r1/a --------->|-- leave r1/a -------->|
//!    |<--------- close -------|                       |
//! ```

pub mod message;
pub mod reject;

pub use message::{RelayKind, RelayMessage, ServerMessage, SignalMessage, SERVER_SENDER_ID};
pub use reject::Rejection;
