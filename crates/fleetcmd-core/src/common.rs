//! Wire types, identity derivation and errors shared by the load generator and
//! the responder.

pub mod envelope;
pub mod error;
pub mod identity;
pub mod timestamp;

pub use envelope::{
    ACK_MESSAGE, ACK_OK, AckEnvelope, CommandEnvelope, DEFAULT_PROTOCOL_VERSION, OPEN_DOOR, build,
};
pub use error::{ConfigError, MAX_PERIOD, TransportError};
pub use identity::{IDENTITY_MAX, IDENTITY_MIN, derive_identity};
pub use timestamp::{Timestamp, TimestampMode};
