//! AMQP 0.9.1 channels, queues and consumers over a shared connection.
//!
//! The connection handshake is not part of this crate: hand an already negotiated stream to
//! [`FramedTransport`] (or implement [`Transport`]) and open channels on a [`Connection`].
//!
//! ```no_run
//! use burrow_client::{Connection, FramedTransport, Message};
//!
//! async fn consume(stream: tokio::net::TcpStream) -> anyhow::Result<()> {
//!     let conn = Connection::new(FramedTransport::new(stream));
//!     let mut channel = conn.channel_open(1).await?;
//!
//!     let mut queue = channel.queue_declare("orders").await?;
//!     channel.queue_bind("orders", "x-orders", "new").await?;
//!
//!     queue.subscribe(|m: &Message| println!("{} bytes", m.len()));
//!     channel.basic_consume(&mut queue).await?;
//!
//!     channel.close().await
//! }
//!
//! # async fn negotiated_stream() -> anyhow::Result<tokio::net::TcpStream> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // RUST_LOG=burrow_client=debug shows the channel lifecycle
//!     burrow_client::setup_logger();
//!
//!     consume(negotiated_stream().await?).await
//! }
//! ```
mod dev;
pub use dev::{setup_logger, setup_test_logger};

pub mod channel;
pub use channel::{Channel, ChannelState, ConsumeOptions, QueueDeclareOptions, QueueDeleteOptions};

mod config;
pub use config::TransportOptions;

mod connection;
pub use connection::Connection;

mod consumer;
pub use consumer::{Consumer, ConsumerSignal};

pub mod error;
pub use error::{to_client_error, ClientError, ErrorKind};

mod message;
pub use message::Message;

mod model;
pub use model::{ChannelNumber, ClassMethod, REPLY_SUCCESS};

mod queue;
pub use queue::{ObserverId, Queue, QueueObserver};

mod reassembler;

pub mod transport;
pub use transport::{CloseReason, FramedTransport, Reply, Transport};
