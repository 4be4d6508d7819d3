//! Replays a script through the compacted topic processor and snapshots the resulting view.

use crate::script::{self, BytesEncoding};
use anyhow::Result;
use base64::Engine;
use clap::{Parser, ValueEnum};
use compacted_topic::{
    decode, CompactedView, KeyDecoder, MemoryConsumer, Message, Processor, ProcessorStats, Step,
    TopicPartition, TopicPartitionList, ValueDecoder,
};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// How message keys become the string keys of the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum KeyFormat {
    /// UTF-8 text; other keys are skipped
    #[default]
    #[value(name = "utf8")]
    Utf8,
    /// Any bytes, rendered as standard base64
    #[value(name = "base64")]
    Base64,
    /// A JSON document, rendered in compact form; other keys are skipped
    #[value(name = "json")]
    Json,
}

impl KeyFormat {
    pub fn decoder(&self) -> KeyDecoder<String> {
        match self {
            KeyFormat::Utf8 => Box::new(decode::utf8),
            KeyFormat::Base64 => Box::new(|bytes: &[u8]| {
                Some(base64::engine::general_purpose::STANDARD.encode(bytes))
            }),
            KeyFormat::Json => Box::new(|bytes: &[u8]| {
                decode::json_key::<Value>(bytes).map(|value| value.to_string())
            }),
        }
    }
}

/// How payloads become the JSON values of the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ValueFormat {
    /// A JSON document; other payloads are skipped
    #[default]
    #[value(name = "json")]
    Json,
    /// UTF-8 text stored as a JSON string; other payloads are skipped
    #[value(name = "utf8")]
    Utf8,
    /// Any bytes stored as a base64 JSON string
    #[value(name = "base64")]
    Base64,
}

impl ValueFormat {
    pub fn decoder(&self) -> ValueDecoder<String, Value> {
        match self {
            ValueFormat::Json => Box::new(decode::json::<String, Value>),
            ValueFormat::Utf8 => Box::new(|key: &String, payload: &[u8]| {
                decode::utf8_value(key, payload).map(Value::String)
            }),
            ValueFormat::Base64 => Box::new(|_key: &String, payload: &[u8]| {
                Some(Value::String(
                    base64::engine::general_purpose::STANDARD.encode(payload),
                ))
            }),
        }
    }
}

/// Replay options
#[derive(Parser, Clone, Debug)]
pub struct ReplayOpts {
    /// JSON Lines script describing the messages and rebalances to replay
    #[arg(long, env = "COMPACTED_VIEW_SCRIPT")]
    pub script: PathBuf,

    /// How key and payload strings in the script are turned into bytes
    #[arg(
        long,
        value_enum,
        default_value = "utf8",
        env = "COMPACTED_VIEW_BYTES_ENCODING"
    )]
    pub bytes_encoding: BytesEncoding,

    /// How message keys are decoded
    #[arg(long, value_enum, default_value = "utf8", env = "COMPACTED_VIEW_KEY_FORMAT")]
    pub key_format: KeyFormat,

    /// How message payloads are decoded
    #[arg(
        long,
        value_enum,
        default_value = "json",
        env = "COMPACTED_VIEW_VALUE_FORMAT"
    )]
    pub value_format: ValueFormat,

    /// Stop after this many processing steps
    #[arg(long, env = "COMPACTED_VIEW_MAX_STEPS")]
    pub max_steps: Option<u64>,
}

/// Keys and values of one partition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSnapshot {
    pub topic: String,
    pub partition: i32,
    /// Whether the end of the partition was reached
    pub caught_up: bool,
    pub entries: BTreeMap<String, Value>,
}

/// Last offset observed on a partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A transport error forwarded by the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub topic: String,
    pub partition: i32,
    pub error: String,
}

/// State after a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub partitions: Vec<PartitionSnapshot>,
    pub offsets: Vec<PartitionOffset>,
    pub assignment: TopicPartitionList,
    pub stats: ProcessorStats,
    pub errors: Vec<ReportedError>,
}

impl Snapshot {
    /// Value stored under `key`, looked up across partitions.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.partitions
            .iter()
            .find_map(|partition| partition.entries.get(key))
    }

    pub fn partition(&self, topic: &str, partition: i32) -> Option<&PartitionSnapshot> {
        self.partitions
            .iter()
            .find(|snapshot| snapshot.topic == topic && snapshot.partition == partition)
    }
}

/// Load the script named by `opts` and replay it.
pub fn run_replay(opts: &ReplayOpts) -> Result<Snapshot> {
    let steps = script::load_script(&opts.script, opts.bytes_encoding)?;
    info!(
        "Loaded {} steps from {}",
        steps.len(),
        opts.script.display()
    );
    replay_steps(steps, opts.key_format, opts.value_format, opts.max_steps)
}

/// Replay `steps` through a processor until they are exhausted or `max_steps`
/// processing steps have run.
pub fn replay_steps(
    steps: Vec<Step>,
    key_format: KeyFormat,
    value_format: ValueFormat,
    max_steps: Option<u64>,
) -> Result<Snapshot> {
    let mut consumer: MemoryConsumer = steps.into_iter().collect();
    let view = Rc::new(RefCell::new(CompactedView::<String, Value>::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));

    let (stats, offsets) = {
        let mut processor = Processor::<_, String, Value>::new(&mut consumer);
        processor.set_key_decoder(key_format.decoder());
        processor.set_value_decoder(value_format.decoder());

        let sink = Rc::clone(&view);
        processor.set_event_handler(move |event| {
            debug!(
                "{} {}/{} key={:?}",
                event.kind(),
                event.topic(),
                event.partition(),
                event.key()
            );
            sink.borrow_mut().apply(event);
        });

        let error_sink = Rc::clone(&errors);
        processor.set_error_handler(move |message: Message| {
            let error = message
                .error()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!("Consumer error on {}: {error}", message.topic_partition());
            error_sink.borrow_mut().push(ReportedError {
                topic: message.topic().to_string(),
                partition: message.partition(),
                error,
            });
        });

        let mut steps_run = 0;
        while !processor.consumer().is_drained() {
            if let Some(max) = max_steps.filter(|max| steps_run >= *max) {
                info!(
                    "Stopping after {max} steps with {} pending",
                    processor.consumer().pending()
                );
                break;
            }
            processor.process_event()?;
            steps_run += 1;
        }

        (processor.stats(), processor.offsets())
    };

    info!(
        "Replay finished: {} messages, {} events, {} skipped",
        stats.messages,
        stats.events,
        stats.skipped_keys + stats.skipped_values
    );

    let assignment = consumer.assignment().clone();
    let rebalanced = consumer.rebalance_count() > 0;

    let view = view.borrow();
    let mut partitions: BTreeMap<TopicPartition, PartitionSnapshot> = BTreeMap::new();
    for (topic_partition, entries) in view.partitions() {
        partitions.insert(
            topic_partition.clone(),
            PartitionSnapshot {
                topic: topic_partition.topic.clone(),
                partition: topic_partition.partition,
                caught_up: view.is_caught_up(topic_partition),
                entries: entries.clone(),
            },
        );
    }
    // An end of partition records no offset, so a revoked partition that only
    // reported its end is never cleared from the view.
    let still_assigned =
        |topic_partition: &TopicPartition| !rebalanced || assignment.contains(topic_partition);
    for topic_partition in view.caught_up().filter(|tp| still_assigned(*tp)) {
        partitions
            .entry(topic_partition.clone())
            .or_insert_with(|| PartitionSnapshot {
                topic: topic_partition.topic.clone(),
                partition: topic_partition.partition,
                caught_up: true,
                entries: BTreeMap::new(),
            });
    }

    let offsets = offsets
        .iter()
        .map(|(topic_partition, offset)| PartitionOffset {
            topic: topic_partition.topic.clone(),
            partition: topic_partition.partition,
            offset,
        })
        .collect();

    let errors = errors.borrow().clone();
    Ok(Snapshot {
        partitions: partitions.into_values().collect(),
        offsets,
        assignment,
        stats,
        errors,
    })
}
