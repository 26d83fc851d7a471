pub mod backoff;
pub mod connection;
pub mod protocol;

pub use backoff::{Backoff, ReconnectPolicy};
pub use connection::{
    connect, CommandSink, ConnectionEvent, ConnectionHandle, ConnectionState, SendOutcome,
};
pub use protocol::{Command, DecodeError, InboundFrame, LoadRecord, StateFrame, LOAD_COUNT};
