use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Callback invoked by a [`Consumer`] whenever its partition assignment changes.
///
/// The list is mutable: a callback may rewrite the starting offset of any
/// element, and the consumer starts reading from whatever the list holds once
/// the callback returns.
pub type AssignmentCallback = Box<dyn FnMut(&mut TopicPartitionList)>;

/// The polling side of a log client.
///
/// Implementations run their assignment callback synchronously from inside
/// [`Consumer::poll`], on the thread that polls.
pub trait Consumer {
    /// Polls the next message, if any is available within the client's own timeout.
    fn poll(&mut self) -> Option<Message>;

    /// Removes the currently installed assignment callback and hands it to the caller.
    ///
    /// Callbacks are uniquely owned, so reading the slot moves the callback out.
    /// Callers that only want to wrap it must put a callback back with
    /// [`Consumer::set_assignment_callback`].
    fn take_assignment_callback(&mut self) -> Option<AssignmentCallback>;

    /// Installs (or clears, with `None`) the assignment callback.
    fn set_assignment_callback(&mut self, callback: Option<AssignmentCallback>);
}

/// Identity of a partition within a topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Starting position requested for an assigned partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Offset {
    /// Start from the beginning of the partition
    Beginning,
    /// Start from the end of the partition
    End,
    /// Start from the offset stored for the consumer group
    Stored,
    /// No offset requested; the client decides
    #[default]
    Invalid,
    /// Start at an explicit offset
    Offset(i64),
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Beginning => f.write_str("beginning"),
            Offset::End => f.write_str("end"),
            Offset::Stored => f.write_str("stored"),
            Offset::Invalid => f.write_str("invalid"),
            Offset::Offset(offset) => write!(f, "{offset}"),
        }
    }
}

/// One entry of an assignment list.
///
/// The offset is not part of the element's identity; see
/// [`TopicPartitionListElem::topic_partition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicPartitionListElem {
    pub topic: String,
    pub partition: i32,
    pub offset: Offset,
}

impl TopicPartitionListElem {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    fn matches(&self, topic_partition: &TopicPartition) -> bool {
        self.partition == topic_partition.partition && self.topic == topic_partition.topic
    }
}

/// Ordered list of assigned partitions handed to assignment callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopicPartitionList {
    elements: Vec<TopicPartitionListElem>,
}

impl TopicPartitionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a partition with no requested offset.
    pub fn add_partition(&mut self, topic: &str, partition: i32) -> &mut TopicPartitionListElem {
        self.add_partition_offset(topic, partition, Offset::Invalid)
    }

    /// Adds a partition starting at `offset`.
    pub fn add_partition_offset(
        &mut self,
        topic: &str,
        partition: i32,
        offset: Offset,
    ) -> &mut TopicPartitionListElem {
        self.elements.push(TopicPartitionListElem {
            topic: topic.to_string(),
            partition,
            offset,
        });
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    pub fn find_partition(&self, topic: &str, partition: i32) -> Option<&TopicPartitionListElem> {
        self.elements
            .iter()
            .find(|elem| elem.topic == topic && elem.partition == partition)
    }

    pub fn contains(&self, topic_partition: &TopicPartition) -> bool {
        self.elements.iter().any(|elem| elem.matches(topic_partition))
    }

    pub fn elements(&self) -> &[TopicPartitionListElem] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [TopicPartitionListElem] {
        &mut self.elements
    }

    pub fn count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<TopicPartitionListElem> for TopicPartitionList {
    fn from_iter<I: IntoIterator<Item = TopicPartitionListElem>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

/// Error attached to a polled message instead of a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The consumer has read everything currently in the partition.
    #[error("Reached end of partition")]
    PartitionEof,

    #[error("Transport error {code}: {reason}")]
    Transport { code: i32, reason: String },
}

/// A polled message: either a record (key + optional payload) or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<Bytes>,
    payload: Option<Bytes>,
    error: Option<MessageError>,
}

impl Message {
    /// Creates a record without key or payload.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: None,
            error: None,
        }
    }

    /// Creates an end-of-partition notification.
    pub fn partition_eof(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self::new(topic, partition, offset).with_error(MessageError::PartitionEof)
    }

    /// Creates a message carrying a transport error.
    pub fn transport_error(
        topic: impl Into<String>,
        partition: i32,
        code: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(topic, partition, -1).with_error(MessageError::Transport {
            code,
            reason: reason.into(),
        })
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_error(mut self, error: MessageError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// True when the payload is absent or empty, i.e. the record deletes its key.
    pub fn is_tombstone(&self) -> bool {
        self.payload.as_ref().map_or(true, |payload| payload.is_empty())
    }

    pub fn error(&self) -> Option<&MessageError> {
        self.error.as_ref()
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.error, Some(MessageError::PartitionEof))
    }
}
