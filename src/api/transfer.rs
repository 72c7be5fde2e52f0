//! Purpose: Move records between URL-addressed JSONL and in-memory tables.
//! Exports: `load`, `load_reader`, `drain_to`, `DrainOutcome`.
//! Role: Glue between `Table`, the ingest engine, and `StorageService`.
//! Invariants: Only JSON objects become records; other values are rejected per the error policy.
//! Invariants: A drain uploads one JSON object per line, in append order.
#![allow(clippy::result_large_err)]

use std::io::Read;

use serde::Serialize;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;
use crate::ingest::{IngestConfig, IngestFailure, IngestOutcome, ingest_jsonl};
use crate::storage::StorageService;
use crate::uri::open_reader_from_url;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DrainOutcome {
    pub records: u64,
    pub bytes: u64,
}

fn add_record(table: &Table, value: Value) -> Result<(), Error> {
    match value {
        Value::Object(object) => {
            table.add(object);
            Ok(())
        }
        _ => Err(Error::new(ErrorKind::Usage).with_message("record must be a JSON object")),
    }
}

/// Ingest JSONL from `reader` into `table`.
pub fn load_reader<R, N>(
    table: &Table,
    reader: R,
    config: IngestConfig,
    on_failure: N,
) -> Result<IngestOutcome, Error>
where
    R: Read,
    N: FnMut(IngestFailure),
{
    ingest_jsonl(reader, config, |value| add_record(table, value), on_failure)
}

/// Ingest JSONL read from `url` (`file`, `http` or `https`) into `table`.
pub fn load<N>(
    table: &Table,
    url: &str,
    config: IngestConfig,
    on_failure: N,
) -> Result<IngestOutcome, Error>
where
    N: FnMut(IngestFailure),
{
    let (reader, mime_type) = open_reader_from_url(url)?;
    tracing::debug!(url, mime_type = %mime_type, "loading records");
    load_reader(table, reader, config, on_failure).map_err(|err| {
        if err.url().is_some() {
            err
        } else {
            err.with_url(url)
        }
    })
}

/// Drain `table` and upload the records to `url` as JSONL. The drain
/// happens before the upload, so a failed upload loses those records.
pub fn drain_to(
    table: &Table,
    service: &dyn StorageService,
    url: &str,
) -> Result<DrainOutcome, Error> {
    let mut buf = Vec::new();
    let mut records = 0u64;
    table.range(|mapping| {
        serde_json::to_writer(&mut buf, &mapping).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode record")
                .with_source(err)
        })?;
        buf.push(b'\n');
        records += 1;
        Ok::<_, Error>(true)
    })?;

    let bytes = buf.len() as u64;
    service.upload(url, &mut buf.as_slice())?;
    tracing::debug!(url, records, bytes, "drained table");
    Ok(DrainOutcome { records, bytes })
}
