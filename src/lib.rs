//! compacted-view
//!
//! Rebuilds the key/value view of compacted topics by replaying what a consumer
//! would observe through the `compacted-topic` processor.
//!
//! # Features
//!
//! - Upserts and tombstones become set/delete events on a per-partition view
//! - Partitions lost in a rebalance are cleared from the view
//! - Retained partitions resume from the last offset observed on them
//! - End-of-partition markers flag partitions as caught up
//!
//! # CLI Usage
//!
//! ```bash
//! # Replay a script and print the resulting view as JSON
//! compacted-view replay --script users.jsonl
//!
//! # Binary keys and payloads, printed as YAML
//! compacted-view replay --script users.jsonl \
//!   --bytes-encoding base64 --key-format base64 --value-format base64 \
//!   --output yaml
//! ```

pub mod replay;
pub mod script;

pub use compacted_topic as topic;
pub use replay::{
    replay_steps, run_replay, KeyFormat, PartitionOffset, PartitionSnapshot, ReplayOpts,
    ReportedError, Snapshot, ValueFormat,
};
pub use script::{load_script, parse_script, BytesEncoding};
