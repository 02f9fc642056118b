//! Putting deliveries together from their frames.
//!
//! A delivery arrives as a `basic.deliver` method frame, a content header declaring the body
//! size and as many content body frames as the broker needed to carry the body.
use crate::client_error;
use crate::message::Message;
use crate::model::{ChannelNumber, ConnectionError};
use crate::transport::Transport;
use anyhow::Result;
use burrow_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use bytes::Bytes;
use log::{debug, trace};

/// Wait for the next complete message of a channel.
///
/// Frames other than `basic.deliver` are skipped until a delivery starts. A failing wait before
/// the delivery method is an error, while a failing wait after it ends the stream and gives
/// `None`, dropping whatever part of the body has arrived.
pub(crate) async fn next_message<T: Transport>(transport: &T, channel: ChannelNumber) -> Result<Option<Message>> {
    loop {
        transport.release_buffers(channel);

        let method = match transport.wait_frame(channel).await {
            Ok(f) => f,
            Err(e) => {
                debug!("Waiting for delivery on channel {} failed {:?}", channel, e);

                return client_error!(
                    Transport,
                    Some(channel),
                    ConnectionError::InternalError as u16,
                    "Error in header frame",
                    0
                );
            }
        };

        match method {
            AMQPFrame::Method(_, frame::BASIC_DELIVER, MethodFrameArgs::BasicDeliver(args)) => {
                trace!(
                    "Delivery {} on channel {} consumer {}",
                    args.delivery_tag,
                    channel,
                    args.consumer_tag
                );
            }
            other => {
                trace!("Skip {:?}", other);
                continue;
            }
        }

        let header = match transport.wait_frame(channel).await {
            Ok(AMQPFrame::ContentHeader(header)) => header,
            Ok(other) => {
                debug!("Expected content header, got {:?}", other);

                return client_error!(
                    Protocol,
                    Some(channel),
                    ConnectionError::UnexpectedFrame as u16,
                    "Expected header!",
                    frame::BASIC_DELIVER
                );
            }
            Err(e) => {
                debug!("Stream ended before content header on channel {} {:?}", channel, e);

                return Ok(None);
            }
        };

        let body_size = match usize::try_from(header.body_size) {
            Ok(size) => size,
            Err(_) => {
                return client_error!(
                    Resource,
                    Some(channel),
                    ConnectionError::ResourceError as u16,
                    format!("Body size {} does not fit in memory", header.body_size),
                    frame::BASIC_DELIVER
                )
            }
        };

        let mut body = Vec::new();

        if body.try_reserve_exact(body_size).is_err() {
            return client_error!(
                Resource,
                Some(channel),
                ConnectionError::ResourceError as u16,
                format!("Cannot allocate {} bytes for the message body", body_size),
                frame::BASIC_DELIVER
            );
        }

        while body.len() < body_size {
            match transport.wait_frame(channel).await {
                Ok(AMQPFrame::ContentBody(fragment)) => {
                    if body.len() + fragment.body.len() > body_size {
                        return client_error!(
                            Protocol,
                            Some(channel),
                            ConnectionError::UnexpectedFrame as u16,
                            "Body frame exceeds the declared body size",
                            frame::BASIC_DELIVER
                        );
                    }

                    body.extend_from_slice(&fragment.body);
                }
                Ok(other) => {
                    debug!("Expected content body, got {:?}", other);

                    return client_error!(
                        Protocol,
                        Some(channel),
                        ConnectionError::UnexpectedFrame as u16,
                        "Expected body frame!",
                        frame::BASIC_DELIVER
                    );
                }
                Err(e) => {
                    debug!(
                        "Stream ended after {} of {} body bytes on channel {} {:?}",
                        body.len(),
                        body_size,
                        channel,
                        e
                    );

                    return Ok(None);
                }
            }
        }

        return Ok(Some(Message::new(Bytes::from(body))));
    }
}
