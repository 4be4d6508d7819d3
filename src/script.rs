//! Replay scripts.
//!
//! A script is a JSON Lines file describing what a consumer would observe, one
//! entry per line. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! {"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"beginning"}]}
//! {"type":"message","topic":"users","partition":0,"offset":0,"key":"u1","payload":"{\"name\":\"alice\"}"}
//! {"type":"message","topic":"users","partition":0,"offset":1,"key":"u1"}
//! {"type":"eof","topic":"users","partition":0}
//! {"type":"error","topic":"users","partition":0,"code":-195,"reason":"broker transport failure"}
//! ```

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use clap::ValueEnum;
use compacted_topic::{Message, Offset, Step, TopicPartitionList};
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// How key and payload strings of a script are turned into bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BytesEncoding {
    /// Use the UTF-8 bytes of the string
    #[default]
    #[value(name = "utf8")]
    Utf8,
    /// Decode the string as standard base64
    #[value(name = "base64")]
    Base64,
}

impl BytesEncoding {
    pub fn to_bytes(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            BytesEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            BytesEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(text)
                .with_context(|| format!("Invalid base64 value: {text}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScriptEntry {
    Message {
        topic: String,
        partition: i32,
        offset: i64,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        payload: Option<String>,
    },
    Eof {
        topic: String,
        partition: i32,
        #[serde(default)]
        offset: i64,
    },
    Error {
        topic: String,
        partition: i32,
        #[serde(default = "default_error_code")]
        code: i32,
        reason: String,
    },
    Rebalance {
        assignment: Vec<ScriptPartition>,
    },
}

// librdkafka's generic transport failure
fn default_error_code() -> i32 {
    -195
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptPartition {
    topic: String,
    partition: i32,
    #[serde(default)]
    offset: Option<ScriptOffset>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum ScriptOffset {
    Position(i64),
    Named(NamedOffset),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NamedOffset {
    Beginning,
    End,
    Stored,
    Invalid,
}

impl ScriptPartition {
    fn start_offset(&self) -> Offset {
        match self.offset {
            None | Some(ScriptOffset::Named(NamedOffset::Invalid)) => Offset::Invalid,
            Some(ScriptOffset::Position(position)) => Offset::Offset(position),
            Some(ScriptOffset::Named(NamedOffset::Beginning)) => Offset::Beginning,
            Some(ScriptOffset::Named(NamedOffset::End)) => Offset::End,
            Some(ScriptOffset::Named(NamedOffset::Stored)) => Offset::Stored,
        }
    }
}

impl ScriptEntry {
    fn into_step(self, encoding: BytesEncoding) -> Result<Step> {
        let step = match self {
            ScriptEntry::Message {
                topic,
                partition,
                offset,
                key,
                payload,
            } => {
                let mut message = Message::new(topic, partition, offset);
                if let Some(key) = key {
                    message = message.with_key(encoding.to_bytes(&key)?);
                }
                if let Some(payload) = payload {
                    message = message.with_payload(encoding.to_bytes(&payload)?);
                }
                Step::Message(message)
            }
            ScriptEntry::Eof {
                topic,
                partition,
                offset,
            } => Step::Message(Message::partition_eof(topic, partition, offset)),
            ScriptEntry::Error {
                topic,
                partition,
                code,
                reason,
            } => Step::Message(Message::transport_error(topic, partition, code, reason)),
            ScriptEntry::Rebalance { assignment } => {
                let mut list = TopicPartitionList::new();
                for elem in assignment {
                    list.add_partition_offset(&elem.topic, elem.partition, elem.start_offset());
                }
                Step::Rebalance(list)
            }
        };
        Ok(step)
    }
}

/// Parse script lines from a reader.
///
/// `source_name` is only used in error messages.
pub fn parse_script<R: std::io::Read>(
    reader: R,
    source_name: &str,
    encoding: BytesEncoding,
) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (line_index, line) in BufReader::new(reader).lines().enumerate() {
        let line_number = line_index + 1;
        let line = line.with_context(|| format!("Failed to read {source_name}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let entry: ScriptEntry = serde_json::from_str(trimmed)
            .map_err(|e| anyhow!("Error parsing {source_name} at line {line_number}: {e}"))?;
        let step = entry
            .into_step(encoding)
            .with_context(|| format!("Invalid entry in {source_name} at line {line_number}"))?;
        steps.push(step);
    }

    Ok(steps)
}

/// Load a script file.
pub fn load_script(path: &Path, encoding: BytesEncoding) -> Result<Vec<Step>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open script {}", path.display()))?;
    parse_script(file, &path.display().to_string(), encoding)
}
