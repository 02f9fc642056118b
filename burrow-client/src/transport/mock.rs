use super::{CloseReason, Reply, Transport};
use crate::client_error;
use crate::model::ChannelNumber;
use anyhow::Result;
use burrow_codec::frame::{self, AMQPFrame, MethodFrameArgs};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One scripted outcome of `wait_frame`.
pub(crate) enum Step {
    Frame(AMQPFrame),
    Fail,
}

/// In-memory transport replaying scripted replies and frames.
#[derive(Default)]
pub(crate) struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    frames: Mutex<VecDeque<Step>>,
    sent: Mutex<Vec<AMQPFrame>>,
    released: AtomicUsize,
    abandoned: Mutex<Vec<ChannelNumber>>,
    abandoned_consumers: Mutex<Vec<(ChannelNumber, String)>>,
    broker_closed: Mutex<HashMap<ChannelNumber, CloseReason>>,
}

impl MockTransport {
    pub(crate) fn new(frames: Vec<Step>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            ..Default::default()
        }
    }

    pub(crate) fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub(crate) fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub(crate) fn sent(&self) -> MutexGuard<'_, Vec<AMQPFrame>> {
        self.sent.lock().unwrap()
    }

    /// Class-method ids of the sent method frames in sending order.
    pub(crate) fn sent_methods(&self) -> Vec<u32> {
        self.sent()
            .iter()
            .filter_map(|f| match f {
                AMQPFrame::Method(_, cm, _) => Some(*cm),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn abandoned(&self) -> Vec<ChannelNumber> {
        self.abandoned.lock().unwrap().clone()
    }

    pub(crate) fn abandoned_consumers(&self) -> Vec<(ChannelNumber, String)> {
        self.abandoned_consumers.lock().unwrap().clone()
    }

    /// Act as if the broker closed the channel between two commands.
    pub(crate) fn close_by_broker(&self, channel: ChannelNumber, code: u16, text: &str) {
        self.broker_closed.lock().unwrap().insert(
            channel,
            CloseReason {
                code,
                text: text.to_string(),
                class_method: 0,
            },
        );
    }
}

impl Transport for MockTransport {
    async fn call(&self, request: AMQPFrame) -> Result<Reply> {
        let channel = request.channel();

        self.sent.lock().unwrap().push(request);

        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => Ok(reply),
            None => client_error!(Transport, Some(channel), 541, "No scripted reply", 0),
        }
    }

    async fn send(&self, f: AMQPFrame) -> Result<()> {
        self.sent.lock().unwrap().push(f);

        Ok(())
    }

    async fn wait_frame(&self, channel: ChannelNumber) -> Result<AMQPFrame> {
        match self.frames.lock().unwrap().pop_front() {
            Some(Step::Frame(f)) => Ok(f),
            _ => client_error!(Transport, Some(channel), 541, "Scripted wait failure", 0),
        }
    }

    fn release_buffers(&self, _channel: ChannelNumber) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn abandon(&self, channel: ChannelNumber) {
        self.abandoned.lock().unwrap().push(channel);
    }

    fn abandon_consumer(&self, channel: ChannelNumber, consumer_tag: &str) {
        self.abandoned_consumers
            .lock()
            .unwrap()
            .push((channel, consumer_tag.to_string()));
    }

    fn closed_by_broker(&self, channel: ChannelNumber) -> Option<CloseReason> {
        self.broker_closed.lock().unwrap().get(&channel).cloned()
    }
}

/// Replies for the tests.
pub(crate) fn ok(args: MethodFrameArgs) -> Reply {
    Reply::Normal(args)
}

pub(crate) fn exception(code: u16, text: &str, class_method: u32) -> Reply {
    Reply::Exception {
        code,
        text: text.to_string(),
        class_method,
    }
}

pub(crate) fn declare_ok(name: &str) -> Reply {
    ok(MethodFrameArgs::QueueDeclareOk(frame::QueueDeclareOkArgs::new(name, 0, 0)))
}
