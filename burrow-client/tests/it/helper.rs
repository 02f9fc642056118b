use burrow_client::{ClientError, Connection, FramedTransport};
use burrow_codec::codec::AMQPCodec;
use burrow_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use futures::{SinkExt, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

/// What the fake broker knows. Tests prepare it and inspect it afterwards.
#[derive(Default)]
pub struct BrokerState {
    /// Queues with the messages waiting in them.
    pub queues: HashMap<String, Vec<Vec<u8>>>,
    /// (queue, exchange, routing key)
    pub bindings: HashSet<(String, String, String)>,
    /// Size of the body fragments, 0 means one frame per body.
    pub fragment_size: usize,
    /// Drop the connection once the queue is drained by a consumer.
    pub hang_up: Option<HangUp>,
    /// Close the channel with this code and text once the queue is drained by a consumer.
    pub close_after_consume: Option<(u16, String)>,
    /// Class-method ids of the methods the client sent.
    pub received: Vec<u32>,
    pub next_queue: u32,
}

pub type Broker = Arc<Mutex<BrokerState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
pub enum HangUp {
    /// Right after the last complete delivery.
    BetweenDeliveries,
    /// In the middle of the body of an extra delivery.
    MidBody,
}

#[allow(dead_code)]
pub fn start() -> (Connection<FramedTransport>, Broker) {
    start_with(BrokerState::default())
}

pub fn start_with(state: BrokerState) -> (Connection<FramedTransport>, Broker) {
    burrow_client::setup_test_logger();

    let (client, server) = tokio::io::duplex(64 * 1024);
    let broker = Arc::new(Mutex::new(state));

    tokio::spawn(serve(Framed::new(server, AMQPCodec {}), broker.clone()));

    (Connection::new(FramedTransport::new(client)), broker)
}

#[allow(dead_code)]
pub fn to_client_error<T: std::fmt::Debug>(result: anyhow::Result<T>) -> ClientError {
    result.unwrap_err().downcast::<ClientError>().unwrap()
}

struct Outcome {
    frames: Vec<AMQPFrame>,
    hang_up: bool,
}

impl Outcome {
    fn reply(f: AMQPFrame) -> Self {
        Self {
            frames: vec![f],
            hang_up: false,
        }
    }
}

async fn serve(mut framed: Framed<DuplexStream, AMQPCodec>, broker: Broker) {
    while let Some(Ok(f)) = framed.next().await {
        let outcome = handle(f, &broker);

        for reply in outcome.frames {
            if framed.send(reply).await.is_err() {
                return;
            }
        }

        if outcome.hang_up {
            return;
        }
    }
}

fn not_found(ch: u16, queue: &str, cm: u32) -> Outcome {
    Outcome::reply(frame::channel_close(
        ch,
        404,
        &format!("NOT_FOUND - no queue '{}' in vhost '/'", queue),
        cm,
    ))
}

fn handle(f: AMQPFrame, broker: &Broker) -> Outcome {
    let mut state = broker.lock().unwrap();

    let (ch, cm, args) = match f {
        AMQPFrame::Method(ch, cm, args) => (ch, cm, args),
        _ => {
            return Outcome {
                frames: vec![],
                hang_up: false,
            }
        }
    };

    state.received.push(cm);

    match args {
        MethodFrameArgs::ChannelOpen => Outcome::reply(frame::channel_open_ok(ch)),
        MethodFrameArgs::ChannelClose(_) => Outcome::reply(frame::channel_close_ok(ch)),
        MethodFrameArgs::QueueDeclare(args) => {
            let name = if args.name.is_empty() {
                state.next_queue += 1;
                format!("amq.gen-{}", state.next_queue)
            } else {
                args.name
            };

            if args.flags.contains(frame::QueueDeclareFlags::PASSIVE) && !state.queues.contains_key(&name) {
                return not_found(ch, &name, cm);
            }

            let count = state.queues.entry(name.clone()).or_default().len() as u32;

            Outcome::reply(frame::QueueDeclareOkArgs::new(&name, count, 0).frame(ch))
        }
        MethodFrameArgs::QueueBind(args) => {
            if !state.queues.contains_key(&args.queue_name) {
                return not_found(ch, &args.queue_name, cm);
            }

            state
                .bindings
                .insert((args.queue_name, args.exchange_name, args.routing_key));

            Outcome::reply(frame::queue_bind_ok(ch))
        }
        MethodFrameArgs::QueueUnbind(args) => {
            state
                .bindings
                .remove(&(args.queue_name, args.exchange_name, args.routing_key));

            Outcome::reply(frame::queue_unbind_ok(ch))
        }
        MethodFrameArgs::QueueDelete(args) => {
            let count = match state.queues.get(&args.queue_name) {
                None => return not_found(ch, &args.queue_name, cm),
                Some(messages) => messages.len() as u32,
            };

            if args.flags.contains(frame::QueueDeleteFlags::IF_EMPTY) && count > 0 {
                return Outcome::reply(frame::channel_close(
                    ch,
                    406,
                    &format!("PRECONDITION_FAILED - queue '{}' in vhost '/' not empty", args.queue_name),
                    cm,
                ));
            }

            state.queues.remove(&args.queue_name);
            state.bindings.retain(|(q, _, _)| q != &args.queue_name);

            Outcome::reply(frame::queue_delete_ok(ch, count))
        }
        MethodFrameArgs::BasicConsume(args) => {
            let messages = match state.queues.get_mut(&args.queue) {
                None => return not_found(ch, &args.queue, cm),
                Some(messages) => std::mem::take(messages),
            };

            let mut frames = vec![frame::basic_consume_ok(ch, &args.consumer_tag)];
            let fragment_size = state.fragment_size;

            for (i, body) in messages.iter().enumerate() {
                frames.push(frame::BasicDeliverArgs::new(&args.consumer_tag, i as u64 + 1, "", &args.queue).frame(ch));
                frames.push(frame::ContentHeaderFrame::new(ch, body.len() as u64).frame());

                let size = if fragment_size == 0 { body.len().max(1) } else { fragment_size };

                for chunk in body.chunks(size) {
                    frames.push(frame::ContentBodyFrame::new(ch, chunk).frame());
                }
            }

            if state.hang_up == Some(HangUp::MidBody) {
                frames.push(frame::BasicDeliverArgs::new(&args.consumer_tag, 1000, "", &args.queue).frame(ch));
                frames.push(frame::ContentHeaderFrame::new(ch, 100).frame());
                frames.push(frame::ContentBodyFrame::new(ch, b"partial").frame());
            }

            if let Some((code, text)) = &state.close_after_consume {
                frames.push(frame::channel_close(ch, *code, text, 0));
            }

            Outcome {
                frames,
                hang_up: state.hang_up.is_some(),
            }
        }
        MethodFrameArgs::BasicCancel { consumer_tag } => Outcome::reply(frame::basic_cancel_ok(ch, &consumer_tag)),
        MethodFrameArgs::ConnectionClose(_) => Outcome::reply(frame::connection_close_ok()),
        _ => Outcome {
            frames: vec![],
            hang_up: false,
        },
    }
}
