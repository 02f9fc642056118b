//! AMQP 0-9-1 frames as Rust values and a `tokio_util` codec to move them over a byte stream.
//!
//! The `frame` module models the methods a channel client exchanges with a broker. Methods
//! without a model are still framed correctly, their arguments are kept as raw bytes in
//! [`frame::MethodFrameArgs::Other`]. Decoding only fails when the framing itself is broken.
pub mod codec;
pub mod frame;
mod wire;
