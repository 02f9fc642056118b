use crate::model;
use std::fmt;

/// Classification of client failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller supplied argument violates a precondition. Nothing was sent.
    Validation,
    /// The broker replied with an exception or broke the frame order.
    Protocol,
    /// Waiting for a frame failed at a point where it cannot be tolerated.
    Transport,
    /// Data handed over by the broker could not be materialized.
    Resource,
}

/// Represents a connection or channel error. If `channel` is `None` it is a
/// connection error.
#[derive(Clone, Debug)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub channel: Option<model::ChannelNumber>,
    pub code: u16,
    pub message: String,
    pub class_method: model::ClassMethod,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientError")
            .field("kind", &self.kind)
            .field("channel", &self.channel)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("class_method", &format!("{:08X}", &self.class_method))
            .finish()
    }
}

impl std::error::Error for ClientError {}

/// Get the `ClientError` out of an `anyhow::Error` if there is one.
pub fn to_client_error(err: &anyhow::Error) -> Option<&ClientError> {
    err.downcast_ref::<ClientError>()
}

/// Shorthand for creating errors in async functions.
#[macro_export]
macro_rules! client_error {
    ($kind:ident, $channel:expr, $code:expr, $message:expr, $cm:expr) => {
        ::std::result::Result::Err(anyhow::Error::new($crate::error::ClientError {
            kind: $crate::error::ErrorKind::$kind,
            channel: $channel,
            code: $code,
            message: ::std::string::String::from($message),
            class_method: $cm,
        }))
    };
}
