//! In-memory key/value view rebuilt from processor events.

use crate::consumer::TopicPartition;
use crate::event::{Event, EventKind};
use std::collections::{BTreeMap, BTreeSet};

/// Latest value per key, kept per partition so a `Clear` drops exactly what
/// the revoked partition contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactedView<K, V> {
    partitions: BTreeMap<TopicPartition, BTreeMap<K, V>>,
    caught_up: BTreeSet<TopicPartition>,
}

impl<K, V> Default for CompactedView<K, V> {
    fn default() -> Self {
        Self {
            partitions: BTreeMap::new(),
            caught_up: BTreeSet::new(),
        }
    }
}

impl<K: Ord, V> CompactedView<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: Event<K, V>) {
        let topic_partition = event.topic_partition();
        let kind = event.kind();
        match (kind, event.into_parts()) {
            (EventKind::Set, (Some(key), Some(value))) => {
                self.partitions
                    .entry(topic_partition)
                    .or_default()
                    .insert(key, value);
            }
            (EventKind::Delete, (Some(key), _)) => {
                if let Some(entries) = self.partitions.get_mut(&topic_partition) {
                    entries.remove(&key);
                }
            }
            (EventKind::Clear, _) => {
                self.partitions.remove(&topic_partition);
                self.caught_up.remove(&topic_partition);
            }
            (EventKind::Eof, _) => {
                self.caught_up.insert(topic_partition);
            }
            _ => {}
        }
    }

    /// Looks `key` up across all partitions.
    ///
    /// Partitions are searched in topic then partition order and the first hit
    /// wins. When the same key can live in several partitions, use
    /// [`CompactedView::partition`] instead.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.partitions.values().find_map(|entries| entries.get(key))
    }

    pub fn partition(&self, topic_partition: &TopicPartition) -> Option<&BTreeMap<K, V>> {
        self.partitions.get(topic_partition)
    }

    pub fn partitions(&self) -> impl Iterator<Item = (&TopicPartition, &BTreeMap<K, V>)> {
        self.partitions.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicPartition, &K, &V)> {
        self.partitions
            .iter()
            .flat_map(|(tp, entries)| entries.iter().map(move |(key, value)| (tp, key, value)))
    }

    /// Whether an end-of-partition event was seen since the partition was last cleared.
    pub fn is_caught_up(&self, topic_partition: &TopicPartition) -> bool {
        self.caught_up.contains(topic_partition)
    }

    pub fn caught_up(&self) -> impl Iterator<Item = &TopicPartition> {
        self.caught_up.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
