//! Transport implementations

pub mod poll;
pub mod recorder;
pub mod replay;
pub mod websocket;

pub use poll::PollTransport;
pub use recorder::PacketRecorder;
pub use replay::ReplayTransport;
pub use websocket::StreamTransport;
