use clap::Parser;
use compacted_view::topic::{Message, Offset, Step, TopicPartitionList};
use compacted_view::{
    replay_steps, run_replay, BytesEncoding, KeyFormat, ReplayOpts, Snapshot, ValueFormat,
};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_script(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn opts_for(file: &NamedTempFile) -> ReplayOpts {
    ReplayOpts {
        script: file.path().to_path_buf(),
        bytes_encoding: BytesEncoding::Utf8,
        key_format: KeyFormat::Utf8,
        value_format: ValueFormat::Json,
        max_steps: None,
    }
}

fn replay(lines: &[&str]) -> Snapshot {
    let file = write_script(lines);
    run_replay(&opts_for(&file)).unwrap()
}

// =============================================================================
// Upserts, tombstones and end of partition
// =============================================================================

#[test]
fn test_upserts_and_tombstones() {
    let snapshot = replay(&[
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"beginning"}]}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":0,"key":"u1","payload":"{\"name\":\"alice\"}"}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":1,"key":"u2","payload":"{\"name\":\"bob\"}"}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":2,"key":"u1"}"#,
        r#"{"type":"eof","topic":"users","partition":0}"#,
    ]);

    let partition = snapshot.partition("users", 0).unwrap();
    assert!(partition.caught_up);
    assert_eq!(partition.entries.len(), 1);
    assert_eq!(snapshot.get("u2"), Some(&json!({"name": "bob"})));
    assert_eq!(snapshot.get("u1"), None);

    assert_eq!(snapshot.offsets.len(), 1);
    assert_eq!(snapshot.offsets[0].offset, 2);

    assert_eq!(snapshot.stats.messages, 3);
    assert_eq!(snapshot.stats.tombstones, 1);
    assert_eq!(snapshot.stats.eofs, 1);
    assert_eq!(snapshot.stats.rebalances, 1);
    // two sets, one delete, one eof
    assert_eq!(snapshot.stats.events, 4);
}

#[test]
fn test_later_upsert_replaces_value() {
    let snapshot = replay(&[
        r#"{"type":"message","topic":"users","partition":0,"offset":0,"key":"u1","payload":"1"}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":1,"key":"u1","payload":"2"}"#,
    ]);

    assert_eq!(snapshot.get("u1"), Some(&json!(2)));
    assert!(!snapshot.partition("users", 0).unwrap().caught_up);
}

#[test]
fn test_eof_without_records_is_reported_as_caught_up() {
    let snapshot = replay(&[r#"{"type":"eof","topic":"users","partition":3}"#]);

    let partition = snapshot.partition("users", 3).unwrap();
    assert!(partition.caught_up);
    assert!(partition.entries.is_empty());
    // eof carries no offset
    assert!(snapshot.offsets.is_empty());
}

#[test]
fn test_undecodable_payload_is_skipped_but_consumed() {
    let snapshot = replay(&[
        r#"{"type":"message","topic":"users","partition":0,"offset":4,"key":"u1","payload":"not json"}"#,
    ]);

    assert_eq!(snapshot.get("u1"), None);
    assert_eq!(snapshot.stats.skipped_values, 1);
    assert_eq!(snapshot.stats.events, 0);
    assert_eq!(snapshot.offsets[0].offset, 4);
}

// =============================================================================
// Rebalances
// =============================================================================

#[test]
fn test_revoked_partition_is_cleared() {
    let snapshot = replay(&[
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0},{"topic":"users","partition":1}]}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":10,"key":"a","payload":"1"}"#,
        r#"{"type":"message","topic":"users","partition":1,"offset":20,"key":"b","payload":"2"}"#,
        r#"{"type":"eof","topic":"users","partition":1}"#,
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0}]}"#,
    ]);

    assert_eq!(snapshot.get("a"), Some(&json!(1)));
    assert_eq!(snapshot.get("b"), None);
    assert!(snapshot.partition("users", 1).is_none());

    assert_eq!(snapshot.offsets.len(), 1);
    assert_eq!(snapshot.offsets[0].partition, 0);
    assert_eq!(snapshot.stats.clears, 1);
    assert_eq!(snapshot.stats.rebalances, 2);
}

#[test]
fn test_revoked_partition_with_only_eof_is_not_caught_up() {
    let snapshot = replay(&[
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0},{"topic":"users","partition":1}]}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":0,"key":"a","payload":"1"}"#,
        r#"{"type":"eof","topic":"users","partition":1}"#,
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0}]}"#,
    ]);

    assert!(snapshot.partition("users", 1).is_none());
    assert_eq!(snapshot.partitions.len(), 1);
    assert_eq!(snapshot.get("a"), Some(&json!(1)));
    assert_eq!(snapshot.assignment.count(), 1);
}

#[test]
fn test_retained_partition_resumes_from_last_offset() {
    let snapshot = replay(&[
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"beginning"}]}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":41,"key":"a","payload":"1"}"#,
        r#"{"type":"message","topic":"users","partition":0,"offset":42,"key":"b","payload":"2"}"#,
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"beginning"},{"topic":"users","partition":1,"offset":"end"}]}"#,
    ]);

    let mut expected = TopicPartitionList::new();
    expected.add_partition_offset("users", 0, Offset::Offset(42));
    expected.add_partition_offset("users", 1, Offset::End);
    assert_eq!(snapshot.assignment, expected);

    assert_eq!(snapshot.stats.clears, 0);
    assert_eq!(snapshot.get("a"), Some(&json!(1)));
    assert_eq!(snapshot.get("b"), Some(&json!(2)));
}

#[test]
fn test_reassigned_partition_starts_from_scratch() {
    let snapshot = replay(&[
        r#"{"type":"message","topic":"users","partition":0,"offset":7,"key":"a","payload":"1"}"#,
        r#"{"type":"rebalance","assignment":[]}"#,
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"beginning"}]}"#,
    ]);

    assert!(snapshot.partitions.is_empty());
    assert!(snapshot.offsets.is_empty());
    assert_eq!(snapshot.assignment.elements()[0].offset, Offset::Beginning);
    assert_eq!(snapshot.stats.clears, 1);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_transport_errors_are_collected() {
    let snapshot = replay(&[
        r#"{"type":"error","topic":"users","partition":2,"code":-185,"reason":"timed out"}"#,
        r#"{"type":"message","topic":"users","partition":2,"offset":0,"key":"a","payload":"1"}"#,
    ]);

    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].partition, 2);
    assert_eq!(snapshot.errors[0].error, "Transport error -185: timed out");
    assert_eq!(snapshot.stats.errors, 1);
    assert_eq!(snapshot.get("a"), Some(&json!(1)));
}

#[test]
fn test_invalid_script_line_is_reported() {
    let file = write_script(&[
        r#"{"type":"eof","topic":"users","partition":0}"#,
        r#"{"type":"message","topic":"users"}"#,
    ]);

    let err = run_replay(&opts_for(&file)).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"), "{err:#}");
}

#[test]
fn test_missing_script_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = ReplayOpts::try_parse_from(["replay", "--script", "unused.jsonl"]).unwrap();
    opts.script = dir.path().join("missing.jsonl");

    let err = run_replay(&opts).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to open script"), "{err:#}");
}

// =============================================================================
// Formats and limits
// =============================================================================

#[test]
fn test_base64_keys_and_values() {
    let file = write_script(&[
        r#"{"type":"message","topic":"blobs","partition":0,"offset":0,"key":"AAE=","payload":"aGk="}"#,
    ]);
    let mut opts = opts_for(&file);
    opts.bytes_encoding = BytesEncoding::Base64;
    opts.key_format = KeyFormat::Base64;
    opts.value_format = ValueFormat::Base64;

    let snapshot = run_replay(&opts).unwrap();
    assert_eq!(snapshot.get("AAE="), Some(&json!("aGk=")));
}

#[test]
fn test_utf8_values_and_json_keys() {
    let steps = vec![Step::Message(
        Message::new("users", 0, 0)
            .with_key(r#"{"id": 1}"#)
            .with_payload("alice"),
    )];

    let snapshot = replay_steps(steps, KeyFormat::Json, ValueFormat::Utf8, None).unwrap();
    assert_eq!(snapshot.get(r#"{"id":1}"#), Some(&json!("alice")));
}

#[test]
fn test_max_steps_stops_early() {
    let steps = (0..3)
        .map(|offset| {
            Step::Message(
                Message::new("users", 0, offset)
                    .with_key(format!("k{offset}"))
                    .with_payload("true"),
            )
        })
        .collect();

    let snapshot = replay_steps(steps, KeyFormat::Utf8, ValueFormat::Json, Some(2)).unwrap();
    assert_eq!(snapshot.stats.messages, 2);
    assert_eq!(snapshot.get("k2"), None);
    assert_eq!(snapshot.offsets[0].offset, 1);
}

#[test]
fn test_replay_opts_from_command_line() {
    let opts = ReplayOpts::try_parse_from([
        "replay",
        "--script",
        "users.jsonl",
        "--key-format",
        "base64",
        "--value-format",
        "utf8",
        "--max-steps",
        "10",
    ])
    .unwrap();

    assert_eq!(opts.key_format, KeyFormat::Base64);
    assert_eq!(opts.value_format, ValueFormat::Utf8);
    assert_eq!(opts.bytes_encoding, BytesEncoding::Utf8);
    assert_eq!(opts.max_steps, Some(10));
}

#[test]
fn test_snapshot_serializes_named_offsets() {
    let snapshot = replay(&[
        r#"{"type":"rebalance","assignment":[{"topic":"users","partition":0,"offset":"end"}]}"#,
    ]);

    let rendered = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(
        rendered["assignment"],
        json!([{"topic": "users", "partition": 0, "offset": "end"}])
    );
    assert_eq!(rendered["stats"]["rebalances"], json!(1));
}
