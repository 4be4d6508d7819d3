use crate::consumer::{AssignmentCallback, Consumer, Message, TopicPartition, TopicPartitionList};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::offsets::OffsetTable;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Decodes a message key; `None` means the key is not decodable and the message is skipped.
pub type KeyDecoder<K> = Box<dyn FnMut(&[u8]) -> Option<K>>;

/// Decodes a non-empty payload for an already decoded key; `None` skips the message.
pub type ValueDecoder<K, V> = Box<dyn FnMut(&K, &[u8]) -> Option<V>>;

/// Receives every event produced by the processor.
pub type EventHandler<K, V> = Box<dyn FnMut(Event<K, V>)>;

/// Receives polled messages that carry a transport error.
pub type ErrorHandler = Box<dyn FnMut(Message)>;

/// Counters kept by a [`Processor`] over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    /// Records polled (messages without an error)
    pub messages: u64,
    /// Events delivered to the event handler
    pub events: u64,
    /// Records skipped because their key was not decodable
    pub skipped_keys: u64,
    /// Records skipped because their value was not decodable
    pub skipped_values: u64,
    /// Records with an empty or absent payload
    pub tombstones: u64,
    /// End-of-partition notifications
    pub eofs: u64,
    /// Transport errors, forwarded or dropped
    pub errors: u64,
    /// Assignment changes observed
    pub rebalances: u64,
    /// Partitions cleared because they were no longer assigned
    pub clears: u64,
}

struct State<K, V> {
    key_decoder: Option<KeyDecoder<K>>,
    value_decoder: Option<ValueDecoder<K, V>>,
    event_handler: Option<EventHandler<K, V>>,
    error_handler: Option<ErrorHandler>,
    offsets: OffsetTable,
    stats: ProcessorStats,
}

impl<K, V> Default for State<K, V> {
    fn default() -> Self {
        Self {
            key_decoder: None,
            value_decoder: None,
            event_handler: None,
            error_handler: None,
            offsets: OffsetTable::new(),
            stats: ProcessorStats::default(),
        }
    }
}

impl<K, V> State<K, V> {
    // Offsets are only recorded once a handler is set, so every Clear and Eof has one.
    fn dispatch(&mut self, event: Event<K, V>) {
        let Some(handler) = self.event_handler.as_mut() else {
            return;
        };
        debug!(
            "Dispatching {} event for {}/{}",
            event.kind(),
            event.topic(),
            event.partition()
        );
        self.stats.events += 1;
        handler(event);
    }

    fn handle_message(&mut self, message: Message) {
        if message.is_eof() {
            self.stats.eofs += 1;
            self.dispatch(Event::eof(message.topic(), message.partition()));
            return;
        }

        if message.error().is_some() {
            self.stats.errors += 1;
            self.forward_error(message);
            return;
        }

        self.stats.messages += 1;
        let key = self
            .key_decoder
            .as_mut()
            .and_then(|decode| decode(message.key().unwrap_or_default()));

        match key {
            None => {
                self.stats.skipped_keys += 1;
                debug!(
                    "Skipping {}@{}: key not decodable",
                    message.topic_partition(),
                    message.offset()
                );
            }
            Some(key) if message.is_tombstone() => {
                self.stats.tombstones += 1;
                self.dispatch(Event::delete(message.topic(), message.partition(), key));
            }
            Some(key) => {
                let payload = message.payload().unwrap_or_default();
                let value = self
                    .value_decoder
                    .as_mut()
                    .and_then(|decode| decode(&key, payload));
                match value {
                    Some(value) => {
                        self.dispatch(Event::set(message.topic(), message.partition(), key, value))
                    }
                    None => {
                        self.stats.skipped_values += 1;
                        debug!(
                            "Skipping {}@{}: value not decodable",
                            message.topic_partition(),
                            message.offset()
                        );
                    }
                }
            }
        }

        // Progress is recorded even for skipped records so a poison message is never re-read.
        self.offsets.record(message.topic_partition(), message.offset());
    }

    fn forward_error(&mut self, message: Message) {
        match self.error_handler.as_mut() {
            Some(handler) => handler(message),
            None => warn!(
                "Dropping consumer error on {}: {}",
                message.topic_partition(),
                message
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
        }
    }

    fn on_assignment(&mut self, assignment: &mut TopicPartitionList) {
        self.stats.rebalances += 1;

        let resumed = self.offsets.resume(assignment);
        let revoked = self.offsets.unassigned(assignment);
        for topic_partition in &revoked {
            self.stats.clears += 1;
            self.dispatch(Event::clear(
                topic_partition.topic.clone(),
                topic_partition.partition,
            ));
            self.offsets.remove(topic_partition);
        }

        info!(
            "Partition assignment changed: {} assigned, {resumed} resumed, {} cleared",
            assignment.count(),
            revoked.len()
        );
    }
}

/// Turns the messages of a compacted topic into [`Event`]s.
///
/// On construction the processor wraps the consumer's assignment callback:
/// the previous callback still runs first on every rebalance, after which
/// partitions this processor has read are resumed at their last seen offset
/// and partitions that are no longer assigned are cleared. Dropping the
/// processor puts the previous callback back.
///
/// # Example
///
/// ```rust
/// use compacted_topic::{decode, MemoryConsumer, Message, Processor};
///
/// let mut consumer = MemoryConsumer::new();
/// consumer.push_message(Message::new("users", 0, 5).with_key("u1").with_payload("alice"));
/// consumer.push_message(Message::new("users", 0, 6).with_key("u1"));
///
/// let mut processor = Processor::<_, String, String>::new(&mut consumer);
/// processor.set_key_decoder(decode::utf8);
/// processor.set_value_decoder(|_key: &String, payload: &[u8]| decode::utf8(payload));
/// processor.set_event_handler(|event| println!("{} {:?}", event.kind(), event.key()));
///
/// processor.process_event().unwrap();
/// processor.process_event().unwrap();
/// assert_eq!(processor.stats().tombstones, 1);
/// ```
pub struct Processor<'a, C: Consumer, K, V> {
    consumer: &'a mut C,
    state: Rc<RefCell<State<K, V>>>,
    previous_callback: Rc<RefCell<Option<AssignmentCallback>>>,
}

impl<'a, C, K, V> Processor<'a, C, K, V>
where
    C: Consumer,
    K: 'static,
    V: 'static,
{
    pub fn new(consumer: &'a mut C) -> Self {
        let state: Rc<RefCell<State<K, V>>> = Rc::new(RefCell::new(State::default()));
        let previous_callback = Rc::new(RefCell::new(consumer.take_assignment_callback()));

        let callback: AssignmentCallback = {
            let state = Rc::clone(&state);
            let previous_callback = Rc::clone(&previous_callback);
            Box::new(move |assignment: &mut TopicPartitionList| {
                if let Some(previous) = previous_callback.borrow_mut().as_mut() {
                    previous(assignment);
                }
                state.borrow_mut().on_assignment(assignment);
            })
        };
        consumer.set_assignment_callback(Some(callback));

        Self {
            consumer,
            state,
            previous_callback,
        }
    }

    pub fn set_key_decoder<F>(&mut self, decoder: F)
    where
        F: FnMut(&[u8]) -> Option<K> + 'static,
    {
        self.state.borrow_mut().key_decoder = Some(Box::new(decoder));
    }

    pub fn set_value_decoder<F>(&mut self, decoder: F)
    where
        F: FnMut(&K, &[u8]) -> Option<V> + 'static,
    {
        self.state.borrow_mut().value_decoder = Some(Box::new(decoder));
    }

    pub fn set_event_handler<F>(&mut self, handler: F)
    where
        F: FnMut(Event<K, V>) + 'static,
    {
        self.state.borrow_mut().event_handler = Some(Box::new(handler));
    }

    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(Message) + 'static,
    {
        self.state.borrow_mut().error_handler = Some(Box::new(handler));
    }

    /// Polls one message and turns it into at most one event.
    ///
    /// Fails without polling if the event handler or a decoder is missing.
    /// Any rebalance the consumer runs inside its poll completes before the
    /// polled message is decoded.
    pub fn process_event(&mut self) -> Result<()> {
        self.ensure_configured()?;

        let Some(message) = self.consumer.poll() else {
            return Ok(());
        };
        self.state.borrow_mut().handle_message(message);
        Ok(())
    }

    fn ensure_configured(&self) -> Result<()> {
        let state = self.state.borrow();
        if state.event_handler.is_none() {
            return Err(Error::NotConfigured("event handler"));
        }
        if state.key_decoder.is_none() {
            return Err(Error::NotConfigured("key decoder"));
        }
        if state.value_decoder.is_none() {
            return Err(Error::NotConfigured("value decoder"));
        }
        Ok(())
    }
}

impl<'a, C: Consumer, K, V> Processor<'a, C, K, V> {
    /// Last offset observed on `topic_partition`, if it is tracked.
    pub fn offset(&self, topic_partition: &TopicPartition) -> Option<i64> {
        self.state.borrow().offsets.get(topic_partition)
    }

    /// Snapshot of every tracked partition and its last observed offset.
    pub fn offsets(&self) -> OffsetTable {
        self.state.borrow().offsets.clone()
    }

    pub fn stats(&self) -> ProcessorStats {
        self.state.borrow().stats
    }

    pub fn consumer(&self) -> &C {
        &*self.consumer
    }

    /// Mutable access to the consumer, e.g. to trigger a rebalance.
    ///
    /// Replacing the assignment callback through this handle detaches the processor
    /// from rebalances until it is dropped.
    pub fn consumer_mut(&mut self) -> &mut C {
        &mut *self.consumer
    }
}

impl<'a, C: Consumer, K, V> Drop for Processor<'a, C, K, V> {
    fn drop(&mut self) {
        let previous = self.previous_callback.borrow_mut().take();
        self.consumer.set_assignment_callback(previous);
    }
}
