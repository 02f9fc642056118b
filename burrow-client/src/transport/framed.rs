use super::{CloseReason, Reply, Transport};
use crate::client_error;
use crate::config::TransportOptions;
use crate::dev::send_timeout;
use crate::model::{ChannelNumber, ConnectionError, REPLY_SUCCESS};
use anyhow::Result;
use burrow_codec::codec::AMQPCodec;
use burrow_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use log::{debug, error, trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Inbox = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<AMQPFrame>>>;

struct Route {
    /// Taken when the broker closes the channel, the inbox still gives out what came before.
    sink: Option<mpsc::UnboundedSender<AMQPFrame>>,
    inbox: Inbox,
    /// The owner dropped the channel, incoming frames are discarded until the close-ok.
    abandoned: bool,
    broker_close: Option<CloseReason>,
}

/// Incoming frame routing table. Once `closed` is set the connection is gone and every route
/// has been dropped.
#[derive(Default)]
struct Routes {
    channels: HashMap<ChannelNumber, Route>,
    closed: Option<CloseReason>,
}

fn lock(routes: &Mutex<Routes>) -> MutexGuard<'_, Routes> {
    routes.lock().unwrap_or_else(|e| e.into_inner())
}

/// Transport over an already established AMQP stream (the handshake is done by the caller).
///
/// A reader task demultiplexes the incoming frames into per-channel inboxes, a writer task
/// drains the outgoing queue into the socket.
pub struct FramedTransport {
    routes: Arc<Mutex<Routes>>,
    outgoing: mpsc::Sender<AMQPFrame>,
    options: TransportOptions,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl FramedTransport {
    /// Start the reader and the writer task. It needs to be called in a tokio runtime.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_options(stream, TransportOptions::default())
    }

    pub fn with_options<S>(stream: S, options: TransportOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (sink, stream) = Framed::new(stream, AMQPCodec {}).split();
        let (out_tx, out_rx) = mpsc::channel(options.outgoing_buffer.max(1));
        let routes = Arc::new(Mutex::new(Routes::default()));

        let writer = tokio::spawn(async move {
            if let Err(e) = handle_outgoing(sink, out_rx).await {
                error!("Error {:?}", e);
            }
        });

        let reader = tokio::spawn(handle_incoming(
            stream,
            routes.clone(),
            out_tx.clone(),
            options.send_timeout,
        ));

        Self {
            routes,
            outgoing: out_tx,
            options,
            reader,
            writer,
        }
    }

    /// Tells if the connection has been closed by the broker or by the peer.
    pub fn is_closed(&self) -> bool {
        lock(&self.routes).closed.is_some()
    }

    fn close_reason(&self) -> Option<CloseReason> {
        lock(&self.routes).closed.clone()
    }

    /// Start collecting the frames of a channel. If the number belongs to an abandoned channel
    /// whose close-ok is still on the way, wait for it first.
    async fn open_route(&self, channel: ChannelNumber) -> Inbox {
        let stale = lock(&self.routes)
            .channels
            .get(&channel)
            .filter(|route| route.abandoned)
            .map(|route| route.inbox.clone());

        if let Some(stale) = stale {
            debug!("Channel {} waits for the close-ok of its previous use", channel);

            let mut stale = stale.lock().await;

            while let Some(f) = stale.recv().await {
                trace!("Drop {:?} of abandoned channel {}", f, channel);
            }
        }

        let (sink, rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(tokio::sync::Mutex::new(rx));

        lock(&self.routes).channels.insert(
            channel,
            Route {
                sink: Some(sink),
                inbox: inbox.clone(),
                abandoned: false,
                broker_close: None,
            },
        );

        inbox
    }

    fn inbox(&self, channel: ChannelNumber) -> Result<Inbox> {
        match lock(&self.routes).channels.get(&channel) {
            Some(route) if !route.abandoned => Ok(route.inbox.clone()),
            _ => client_error!(
                Transport,
                Some(channel),
                ConnectionError::ChannelError as u16,
                format!("Channel {} is not open", channel),
                0
            ),
        }
    }
}

impl Transport for FramedTransport {
    async fn call(&self, request: AMQPFrame) -> Result<Reply> {
        if let Some(reason) = self.close_reason() {
            return Ok(reason.to_reply());
        }

        let channel = request.channel();
        let (opening, closing) = match &request {
            AMQPFrame::Method(_, cm, _) => (*cm == frame::CHANNEL_OPEN, *cm == frame::CHANNEL_CLOSE),
            _ => (false, false),
        };

        let inbox = if opening {
            self.open_route(channel).await
        } else {
            self.inbox(channel)?
        };
        let mut inbox = inbox.lock().await;

        debug!("Call {:?}", request);

        send_timeout(&self.outgoing, request, self.options.send_timeout).await?;

        loop {
            match inbox.recv().await {
                Some(AMQPFrame::Method(_, cm, args)) => {
                    if matches!(cm, frame::BASIC_DELIVER | frame::BASIC_CANCEL | frame::BASIC_CANCEL_OK) {
                        trace!("Skip asynchronous method {:08X} while waiting for a reply", cm);
                        continue;
                    }

                    if let MethodFrameArgs::Other(_) = args {
                        debug!("Skip unknown method {:08X} while waiting for a reply", cm);
                        continue;
                    }

                    if let Some(reply) = Reply::from_close(&args) {
                        return Ok(reply);
                    }

                    if closing {
                        lock(&self.routes).channels.remove(&channel);
                    }

                    return Ok(Reply::Normal(args));
                }
                Some(other) => {
                    trace!("Skip {:?} while waiting for a reply", other);
                }
                None => {
                    if let Some(reason) = self.close_reason() {
                        return Ok(reason.to_reply());
                    }

                    return client_error!(
                        Transport,
                        Some(channel),
                        ConnectionError::InternalError as u16,
                        format!("Channel {} closed while waiting for a reply", channel),
                        0
                    );
                }
            }
        }
    }

    async fn send(&self, f: AMQPFrame) -> Result<()> {
        trace!("Send {:?}", f);

        send_timeout(&self.outgoing, f, self.options.send_timeout).await
    }

    async fn wait_frame(&self, channel: ChannelNumber) -> Result<AMQPFrame> {
        let inbox = self.inbox(channel)?;
        let mut inbox = inbox.lock().await;

        match inbox.recv().await {
            Some(f) => Ok(f),
            None => {
                let text = match self.close_reason() {
                    Some(reason) => format!("Connection is closed: {}", reason.text),
                    None => match self.closed_by_broker(channel) {
                        Some(reason) => format!("Channel {} was closed by the broker: {}", channel, reason.text),
                        None => format!("Channel {} is closed", channel),
                    },
                };

                client_error!(Transport, Some(channel), ConnectionError::InternalError as u16, text, 0)
            }
        }
    }

    fn abandon(&self, channel: ChannelNumber) {
        {
            let mut routes = lock(&self.routes);

            let closed_by_broker = match routes.channels.get(&channel) {
                Some(route) => route.broker_close.is_some(),
                None => return,
            };

            if closed_by_broker || routes.closed.is_some() {
                routes.channels.remove(&channel);

                return;
            }

            if let Some(route) = routes.channels.get_mut(&channel) {
                route.abandoned = true;
            }
        }

        let close = frame::channel_close(channel, REPLY_SUCCESS, "Channel dropped", 0);

        if let Err(e) = self.outgoing.try_send(close) {
            debug!("Cannot send close of abandoned channel {}: {:?}", channel, e);

            // no close-ok will come
            lock(&self.routes).channels.remove(&channel);
        }
    }

    fn abandon_consumer(&self, channel: ChannelNumber, consumer_tag: &str) {
        if self.is_closed() {
            return;
        }

        debug!("Cancel abandoned consumer {:?} on channel {}", consumer_tag, channel);

        if let Err(e) = self.outgoing.try_send(frame::basic_cancel(channel, consumer_tag)) {
            warn!("Cannot cancel abandoned consumer {:?}: {:?}", consumer_tag, e);
        }
    }

    fn closed_by_broker(&self, channel: ChannelNumber) -> Option<CloseReason> {
        lock(&self.routes)
            .channels
            .get(&channel)
            .and_then(|route| route.broker_close.clone())
    }
}

impl Drop for FramedTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn handle_outgoing<S>(
    mut sink: SplitSink<Framed<S, AMQPCodec>, AMQPFrame>,
    mut outgoing: mpsc::Receiver<AMQPFrame>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(f) = outgoing.recv().await {
        trace!("Outgoing frame {:?}", f);

        sink.send(f).await?;
    }

    Ok(())
}

async fn handle_incoming<S>(
    mut stream: SplitStream<Framed<S, AMQPCodec>>,
    routes: Arc<Mutex<Routes>>,
    outgoing: mpsc::Sender<AMQPFrame>,
    timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(f) => {
                if let Err(e) = route_frame(f, &routes, &outgoing, timeout).await {
                    error!("Error {:?}", e);
                }
            }
            Err(e) => {
                error!("Cannot decode incoming frame {:?}", e);
                break;
            }
        }
    }

    debug!("Incoming stream is closed");

    let mut routes = lock(&routes);

    if routes.closed.is_none() {
        routes.closed = Some(CloseReason {
            code: ConnectionError::InternalError as u16,
            text: "Connection closed by the peer".to_string(),
            class_method: 0,
        });
    }

    routes.channels.clear();
}

async fn route_frame(
    f: AMQPFrame,
    routes: &Mutex<Routes>,
    outgoing: &mpsc::Sender<AMQPFrame>,
    timeout: Duration,
) -> Result<()> {
    match f {
        AMQPFrame::Heartbeat(_) => {
            trace!("Heartbeat");

            Ok(())
        }
        AMQPFrame::Method(_, frame::CONNECTION_CLOSE, MethodFrameArgs::ConnectionClose(args)) => {
            warn!("Connection closed by the broker {} {}", args.code, args.text);

            {
                let mut r = lock(routes);

                r.closed = Some(CloseReason::from_args(&args));
                r.channels.clear();
            }

            send_timeout(outgoing, frame::connection_close_ok(), timeout).await
        }
        AMQPFrame::Method(channel, frame::CHANNEL_CLOSE, MethodFrameArgs::ChannelClose(args)) => {
            warn!("Channel {} closed by the broker {} {}", channel, args.code, args.text);

            {
                let mut r = lock(routes);
                let reason = CloseReason::from_args(&args);

                let abandoned = match r.channels.get_mut(&channel) {
                    Some(route) if !route.abandoned => {
                        route.broker_close = Some(reason);

                        if let Some(sink) = route.sink.take() {
                            let _ = sink.send(AMQPFrame::Method(
                                channel,
                                frame::CHANNEL_CLOSE,
                                MethodFrameArgs::ChannelClose(args),
                            ));
                        }

                        false
                    }
                    Some(_) => true,
                    None => false,
                };

                if abandoned {
                    r.channels.remove(&channel);
                }
            }

            send_timeout(outgoing, frame::channel_close_ok(channel), timeout).await
        }
        other => {
            let channel = other.channel();
            let mut r = lock(routes);

            let close_ok_of_abandoned = match r.channels.get(&channel) {
                Some(route) if !route.abandoned => {
                    match &route.sink {
                        Some(sink) => {
                            trace!("Incoming frame {:?}", other);

                            if let Err(e) = sink.send(other) {
                                warn!("Nobody listens on channel {}, dropping {:?}", channel, e.0);
                            }
                        }
                        None => debug!("Drop {:?} of channel {} closed by the broker", other, channel),
                    }

                    false
                }
                Some(_) => {
                    trace!("Drop {:?} of abandoned channel {}", other, channel);

                    matches!(other, AMQPFrame::Method(_, frame::CHANNEL_CLOSE_OK, _))
                }
                None => {
                    warn!("Frame on unknown channel {}: {:?}", channel, other);

                    false
                }
            };

            if close_ok_of_abandoned {
                r.channels.remove(&channel);
            }

            Ok(())
        }
    }
}
