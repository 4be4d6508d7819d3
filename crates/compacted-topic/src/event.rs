use crate::consumer::TopicPartition;
use std::fmt;

/// Kind of change described by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A key was set to a value
    Set,
    /// A key was deleted by a tombstone
    Delete,
    /// The partition is no longer assigned; every key it held is gone
    Clear,
    /// The partition has been read up to its current end
    Eof,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Set => "set",
            EventKind::Delete => "delete",
            EventKind::Clear => "clear",
            EventKind::Eof => "eof",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change<K, V> {
    Set { key: K, value: V },
    Delete { key: K },
    Clear,
    Eof,
}

/// A change observed on one partition of a compacted topic.
///
/// Only the valid shapes can be built: `Set` carries a key and a value,
/// `Delete` carries a key, `Clear` and `Eof` carry neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<K, V> {
    topic: String,
    partition: i32,
    change: Change<K, V>,
}

impl<K, V> Event<K, V> {
    pub fn set(topic: impl Into<String>, partition: i32, key: K, value: V) -> Self {
        Self::with_change(topic, partition, Change::Set { key, value })
    }

    pub fn delete(topic: impl Into<String>, partition: i32, key: K) -> Self {
        Self::with_change(topic, partition, Change::Delete { key })
    }

    pub fn clear(topic: impl Into<String>, partition: i32) -> Self {
        Self::with_change(topic, partition, Change::Clear)
    }

    pub fn eof(topic: impl Into<String>, partition: i32) -> Self {
        Self::with_change(topic, partition, Change::Eof)
    }

    fn with_change(topic: impl Into<String>, partition: i32, change: Change<K, V>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            change,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.change {
            Change::Set { .. } => EventKind::Set,
            Change::Delete { .. } => EventKind::Delete,
            Change::Clear => EventKind::Clear,
            Change::Eof => EventKind::Eof,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// The key, present for `Set` and `Delete` events only.
    pub fn key(&self) -> Option<&K> {
        match &self.change {
            Change::Set { key, .. } | Change::Delete { key } => Some(key),
            Change::Clear | Change::Eof => None,
        }
    }

    /// The value, present for `Set` events only.
    pub fn value(&self) -> Option<&V> {
        match &self.change {
            Change::Set { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Consumes the event, returning its key and value.
    pub fn into_parts(self) -> (Option<K>, Option<V>) {
        match self.change {
            Change::Set { key, value } => (Some(key), Some(value)),
            Change::Delete { key } => (Some(key), None),
            Change::Clear | Change::Eof => (None, None),
        }
    }
}
