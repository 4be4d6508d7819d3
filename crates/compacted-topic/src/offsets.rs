//! Last-observed offset per partition.

use crate::consumer::{Offset, TopicPartition, TopicPartitionList};
use std::collections::{BTreeMap, BTreeSet};

/// Offsets of the last message observed on each tracked partition.
///
/// Ordered by topic then partition, so sweeps visit partitions in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: BTreeMap<TopicPartition, i64>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `offset` as the last one observed on `topic_partition`.
    pub fn record(&mut self, topic_partition: TopicPartition, offset: i64) {
        self.offsets.insert(topic_partition, offset);
    }

    pub fn get(&self, topic_partition: &TopicPartition) -> Option<i64> {
        self.offsets.get(topic_partition).copied()
    }

    pub fn remove(&mut self, topic_partition: &TopicPartition) -> Option<i64> {
        self.offsets.remove(topic_partition)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TopicPartition, i64)> {
        self.offsets.iter().map(|(tp, offset)| (tp, *offset))
    }

    /// Points every tracked partition of `assignment` at its recorded offset.
    ///
    /// Returns the number of elements rewritten.
    pub fn resume(&self, assignment: &mut TopicPartitionList) -> usize {
        let mut resumed = 0;
        for elem in assignment.elements_mut() {
            if let Some(offset) = self.get(&elem.topic_partition()) {
                elem.offset = Offset::Offset(offset);
                resumed += 1;
            }
        }
        resumed
    }

    /// Tracked partitions that `assignment` no longer contains, in table order.
    pub fn unassigned(&self, assignment: &TopicPartitionList) -> Vec<TopicPartition> {
        let assigned: BTreeSet<TopicPartition> = assignment
            .elements()
            .iter()
            .map(|elem| elem.topic_partition())
            .collect();

        self.offsets
            .keys()
            .filter(|tp| !assigned.contains(*tp))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites() {
        let mut table = OffsetTable::new();
        let tp = TopicPartition::new("t", 0);
        table.record(tp.clone(), 5);
        table.record(tp.clone(), 6);
        assert_eq!(table.get(&tp), Some(6));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_resume_only_touches_tracked_partitions() {
        let mut table = OffsetTable::new();
        table.record(TopicPartition::new("t", 0), 6);

        let mut assignment = TopicPartitionList::new();
        assignment.add_partition_offset("t", 0, Offset::Beginning);
        assignment.add_partition_offset("t", 1, Offset::Beginning);

        assert_eq!(table.resume(&mut assignment), 1);
        assert_eq!(
            assignment.find_partition("t", 0).map(|elem| elem.offset),
            Some(Offset::Offset(6))
        );
        assert_eq!(
            assignment.find_partition("t", 1).map(|elem| elem.offset),
            Some(Offset::Beginning)
        );
    }

    #[test]
    fn test_unassigned_is_ordered() {
        let mut table = OffsetTable::new();
        table.record(TopicPartition::new("b", 0), 1);
        table.record(TopicPartition::new("a", 3), 1);
        table.record(TopicPartition::new("a", 1), 1);

        let mut assignment = TopicPartitionList::new();
        assignment.add_partition("a", 3);

        assert_eq!(
            table.unassigned(&assignment),
            vec![TopicPartition::new("a", 1), TopicPartition::new("b", 0)]
        );
    }
}
