use crate::channel::QueueDeclareOptions;
use crate::message::Message;
use std::fmt;

/// Receives the messages a consumer delivers to a queue.
pub trait QueueObserver: Send {
    fn update(&mut self, message: &Message);
}

impl<F> QueueObserver for F
where
    F: FnMut(&Message) + Send,
{
    fn update(&mut self, message: &Message) {
        self(message)
    }
}

/// Handle of a registered observer, needed to unsubscribe it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A declared queue.
///
/// It is created by `Channel::queue_declare` and carries the name the broker knows the queue
/// by, the consumer tag of the running or last consume and the observers of the deliveries.
pub struct Queue {
    name: String,
    consumer_tag: String,
    options: QueueDeclareOptions,
    observers: Vec<(ObserverId, Box<dyn QueueObserver>)>,
    next_id: u64,
}

impl Queue {
    pub(crate) fn new(name: String, options: QueueDeclareOptions) -> Self {
        Self {
            name,
            consumer_tag: String::new(),
            options,
            observers: vec![],
            next_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Empty until a consume starts on the queue.
    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    pub(crate) fn set_consumer_tag(&mut self, tag: String) {
        self.consumer_tag = tag;
    }

    pub fn options(&self) -> &QueueDeclareOptions {
        &self.options
    }

    pub fn subscribe<O>(&mut self, observer: O) -> ObserverId
    where
        O: QueueObserver + 'static,
    {
        let id = ObserverId(self.next_id);

        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));

        id
    }

    /// Remove an observer, returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();

        self.observers.retain(|(oid, _)| *oid != id);

        before != self.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Hand a message to every observer in subscription order.
    pub fn notify(&mut self, message: &Message) {
        for (_, observer) in self.observers.iter_mut() {
            observer.update(message);
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("consumer_tag", &self.consumer_tag)
            .field("options", &self.options)
            .field("observers", &self.observers.len())
            .finish()
    }
}
