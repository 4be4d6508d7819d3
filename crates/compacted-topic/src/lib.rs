//! Projection of compacted topics into typed key/value events.
//!
//! A compacted topic carries upserts (key + payload) and tombstones (key with
//! an empty payload). The [`Processor`] polls one message at a time from a
//! [`Consumer`], decodes it with user supplied decoders and hands the result to
//! an event handler as an [`Event`]:
//!
//! - `Set` for a decodable key with a decodable payload
//! - `Delete` for a decodable key with an empty payload
//! - `Eof` when the consumer reports the end of a partition
//! - `Clear` when a rebalance takes away a partition the processor had read
//!
//! The processor remembers the last offset it saw on every partition and, when
//! the consumer's assignment changes, resumes retained partitions from there.

/// Consumer abstraction, messages and assignment lists
pub mod consumer;
pub mod decode;
pub mod error;
pub mod event;

/// Scripted in-memory consumer
pub mod memory;
pub mod offsets;
pub mod processor;
pub mod view;


// Re-export main types for easy access
pub use consumer::{
    AssignmentCallback, Consumer, Message, MessageError, Offset, TopicPartition,
    TopicPartitionList, TopicPartitionListElem,
};
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use memory::{MemoryConsumer, Step};
pub use offsets::OffsetTable;
pub use processor::{
    ErrorHandler, EventHandler, KeyDecoder, Processor, ProcessorStats, ValueDecoder,
};
pub use view::CompactedView;
