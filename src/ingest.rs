//! Purpose: Parse line-delimited JSON streams into values with an explicit error policy.
//! Exports: `ErrorPolicy`, `IngestConfig`, `IngestOutcome`, `IngestFailure`, `FailureKind`, `ingest_jsonl`.
//! Role: Input engine feeding tables from URLs and stdin; isolates parsing from the CLI.
//! Invariants: Skip mode only continues at line boundaries; Stop mode fails on the first bad record.
//! Invariants: No unbounded buffering; records above `max_record_bytes` are rejected.
use std::io::{self, BufRead, BufReader, Read};

use bstr::ByteSlice;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorPolicy {
    Stop,
    Skip,
}

#[derive(Copy, Clone, Debug)]
pub struct IngestConfig {
    pub errors: ErrorPolicy,
    pub max_record_bytes: usize,
    pub max_snippet_bytes: usize,
}

impl IngestConfig {
    pub fn new() -> Self {
        Self {
            errors: ErrorPolicy::Stop,
            max_record_bytes: 1024 * 1024,
            max_snippet_bytes: 160,
        }
    }

    pub fn with_errors(mut self, errors: ErrorPolicy) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
        self.max_record_bytes = max_record_bytes;
        self
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub records_total: u64,
    pub ok: u64,
    pub failed: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Parse,
    Oversize,
    Rejected,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Parse => "parse",
            FailureKind::Oversize => "oversize",
            FailureKind::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IngestFailure {
    pub index: u64,
    pub line: u64,
    pub kind: FailureKind,
    pub message: String,
    pub snippet: Option<String>,
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

/// Feed every non-blank line of `reader` to `on_value` as one JSON value.
/// Failures go to `on_failure` under `Skip` and end ingestion under `Stop`.
pub fn ingest_jsonl<R, F, N>(
    reader: R,
    config: IngestConfig,
    mut on_value: F,
    mut on_failure: N,
) -> Result<IngestOutcome, Error>
where
    R: Read,
    F: FnMut(Value) -> Result<(), Error>,
    N: FnMut(IngestFailure),
{
    let mut outcome = IngestOutcome::default();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut index = 0u64;
    let mut line_no = 0u64;

    let mut fail = |failure: IngestFailure, outcome: &mut IngestOutcome| -> Result<(), Error> {
        match config.errors {
            ErrorPolicy::Stop => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("line {}: {}", failure.line, failure.message))
                .with_hint("Use --errors skip to continue past bad records.")),
            ErrorPolicy::Skip => {
                tracing::warn!(
                    line = failure.line,
                    kind = failure.kind.as_str(),
                    "skipping record: {}",
                    failure.message
                );
                outcome.failed += 1;
                on_failure(failure);
                Ok(())
            }
        }
    };

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| io_error(err, "failed to read input"))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let record = buf.trim_end_with(|c| c == '\n' || c == '\r');
        if record.trim().is_empty() {
            continue;
        }
        index += 1;

        if record.len() > config.max_record_bytes {
            fail(
                IngestFailure {
                    index,
                    line: line_no,
                    kind: FailureKind::Oversize,
                    message: "record exceeds size limit".to_string(),
                    snippet: Some(truncate_snippet(record, config.max_snippet_bytes)),
                },
                &mut outcome,
            )?;
            continue;
        }

        let value = match serde_json::from_slice::<Value>(record) {
            Ok(value) => value,
            Err(err) => {
                fail(
                    IngestFailure {
                        index,
                        line: line_no,
                        kind: FailureKind::Parse,
                        message: format!("invalid json: {err}"),
                        snippet: Some(truncate_snippet(record, config.max_snippet_bytes)),
                    },
                    &mut outcome,
                )?;
                continue;
            }
        };

        match on_value(value) {
            Ok(()) => outcome.ok += 1,
            Err(err) if err.kind() == ErrorKind::Usage => {
                let message = err.message().unwrap_or("record rejected").to_string();
                fail(
                    IngestFailure {
                        index,
                        line: line_no,
                        kind: FailureKind::Rejected,
                        message,
                        snippet: Some(truncate_snippet(record, config.max_snippet_bytes)),
                    },
                    &mut outcome,
                )?;
            }
            Err(err) => return Err(err),
        }
    }

    outcome.records_total = outcome.ok + outcome.failed;
    Ok(outcome)
}

fn truncate_snippet(input: &[u8], max: usize) -> String {
    let text = input.to_str_lossy();
    if text.len() <= max {
        return text.into_owned();
    }
    let suffix = "...";
    if max <= suffix.len() {
        return suffix[..max].to_string();
    }
    let mut end = max - suffix.len();
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{suffix}", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::{ErrorPolicy, FailureKind, IngestConfig, IngestFailure, ingest_jsonl, truncate_snippet};
    use crate::core::error::{Error, ErrorKind};

    fn config(errors: ErrorPolicy) -> IngestConfig {
        IngestConfig {
            errors,
            max_record_bytes: 64,
            max_snippet_bytes: 16,
        }
    }

    #[test]
    fn skip_continues_on_parse_error() {
        let input = b"{\"a\":1}\nnot-json\n\n{\"b\":2}\r\n";
        let mut values = Vec::new();
        let mut failures = Vec::new();
        let outcome = ingest_jsonl(
            &input[..],
            config(ErrorPolicy::Skip),
            |value| {
                values.push(value);
                Ok(())
            },
            |failure: IngestFailure| failures.push(failure),
        )
        .expect("ingest");

        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["b"], 2);
        assert_eq!(outcome.ok, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.records_total, 3);
        assert_eq!(failures[0].kind, FailureKind::Parse);
        assert_eq!(failures[0].line, 2);
        assert!(failures[0].message.contains("invalid json"));
    }

    #[test]
    fn stop_fails_on_first_bad_record() {
        let input = b"{\"a\":1}\n{oops\n{\"b\":2}\n";
        let mut values = Vec::new();
        let err = ingest_jsonl(
            &input[..],
            config(ErrorPolicy::Stop),
            |value| {
                values.push(value);
                Ok(())
            },
            |_| {},
        )
        .expect_err("stop");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap_or_default().starts_with("line 2"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn oversize_records_are_reported() {
        let long = format!("{{\"k\":\"{}\"}}\n", "x".repeat(100));
        let mut failures = Vec::new();
        let outcome = ingest_jsonl(
            long.as_bytes(),
            config(ErrorPolicy::Skip),
            |_| Ok(()),
            |failure| failures.push(failure),
        )
        .expect("ingest");
        assert_eq!(outcome.failed, 1);
        assert_eq!(failures[0].kind, FailureKind::Oversize);
        assert_eq!(failures[0].snippet.as_deref().map(str::len), Some(16));
    }

    #[test]
    fn rejected_values_follow_policy() {
        let input = b"[1]\n{\"a\":1}\n";
        let reject = |value: serde_json::Value| {
            if value.is_object() {
                Ok(())
            } else {
                Err(Error::new(ErrorKind::Usage).with_message("record must be a JSON object"))
            }
        };

        let mut failures = Vec::new();
        let outcome = ingest_jsonl(&input[..], config(ErrorPolicy::Skip), reject, |failure| {
            failures.push(failure)
        })
        .expect("ingest");
        assert_eq!(outcome.ok, 1);
        assert_eq!(failures[0].kind, FailureKind::Rejected);

        let err = ingest_jsonl(&input[..], config(ErrorPolicy::Stop), reject, |_| {})
            .expect_err("stop");
        assert!(err.message().unwrap_or_default().contains("JSON object"));
    }

    #[test]
    fn non_usage_errors_always_propagate() {
        let input = b"{\"a\":1}\n";
        let err = ingest_jsonl(
            &input[..],
            config(ErrorPolicy::Skip),
            |_| Err(Error::new(ErrorKind::Io).with_message("sink failed")),
            |_| {},
        )
        .expect_err("io");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        assert_eq!(truncate_snippet(b"short", 16), "short");
        assert_eq!(truncate_snippet("ééééé".as_bytes(), 6), "é...");
        assert_eq!(truncate_snippet(b"abcdef", 2), "..");
    }
}
