use burrow_codec::frame;

/// AMQP channel number
pub type ChannelNumber = frame::Channel;
/// AMQP class id method id number
pub type ClassMethod = frame::ClassMethod;

/// Reply code of a successful close, the only "normal" reply.
pub const REPLY_SUCCESS: u16 = 200;

/// Highest channel number the client hands out unless configured otherwise.
pub const DEFAULT_CHANNEL_MAX: ChannelNumber = 2047;

/// Error codes in connection scope which the client itself raises.
#[derive(Debug)]
pub enum ConnectionError {
    /// The client sent a frame which didn't fit in the normal order.
    CommandInvalid = 503,
    /// The client tried to access a non-existing or not-opened channel.
    ChannelError = 504,
    /// The client received an unexpected content header or body frame.
    UnexpectedFrame = 505,
    /// The client could not allocate what the broker asked for.
    ResourceError = 506,
    /// The connection went away under a pending call.
    InternalError = 541,
}
