//! Purpose: Sparse record table with a late-bound schema and atomic draining.
//! Exports: `Table`, `TableOptions`.
//! Role: Producers `add` name/value mappings; a consumer `range`s over buffered records.
//! Invariants: Append and drain-detach share one lock; every record is drained exactly once.
//! Invariants: Drains emit records in append order and only significant values.
//! Invariants: The storage mode (compacted or dense) is fixed at construction.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::core::codec::{self, CompactRecord, DenseRecord};
use crate::core::error::{Error, ErrorKind};
use crate::core::field::{FieldRegistry, FieldSnapshot};
use crate::core::value::is_significant;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableOptions {
    /// Store records with absent runs collapsed instead of as dense arrays.
    pub compacted: bool,
}

impl TableOptions {
    pub fn new() -> Self {
        Self { compacted: true }
    }

    pub fn with_compacted(mut self, compacted: bool) -> Self {
        self.compacted = compacted;
        self
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum Record {
    Dense(DenseRecord),
    Compact(CompactRecord),
}

impl Record {
    /// Dense form of the record. `width` comes from a registry snapshot
    /// taken after the record was stored, so it covers every stored index.
    fn into_dense(self, width: usize) -> DenseRecord {
        match self {
            Record::Dense(values) => values,
            Record::Compact(slots) => {
                debug_assert!(codec::covered_width(&slots) <= width);
                codec::expand(slots, width)
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Hand back every buffered record, leaving the store empty.
    fn take(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug)]
pub struct Table {
    options: TableOptions,
    registry: FieldRegistry,
    store: Mutex<RecordStore>,
    size: AtomicU64,
}

impl Table {
    pub fn new(options: TableOptions) -> Self {
        Self {
            options,
            registry: FieldRegistry::new(),
            store: Mutex::new(RecordStore::default()),
            size: AtomicU64::new(0),
        }
    }

    pub fn compacted() -> Self {
        Self::new(TableOptions::new().with_compacted(true))
    }

    pub fn dense() -> Self {
        Self::new(TableOptions::new().with_compacted(false))
    }

    pub fn options(&self) -> TableOptions {
        self.options
    }

    /// Append one record. Every entry registers its field and counts
    /// toward `size`; a JSON `null` is stored as an absent slot. A mapping
    /// with no entries appends nothing.
    pub fn add<I, K>(&self, mapping: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut record: DenseRecord = Vec::new();
        let mut entries = 0usize;
        for (name, value) in mapping {
            let index = self.registry.resolve(name.as_ref());
            if index >= record.len() {
                record.resize(index + 1, None);
            }
            record[index] = (!value.is_null()).then_some(value);
            self.size.fetch_add(1, Ordering::Relaxed);
            entries += 1;
        }
        if entries == 0 {
            return;
        }

        let record = if self.options.compacted {
            Record::Compact(codec::encode_owned(record))
        } else {
            Record::Dense(record)
        };
        self.lock_store().push(record);
    }

    /// Append a JSON object as one record.
    pub fn add_value(&self, value: &Value) -> Result<(), Error> {
        let object = value.as_object().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("record must be a JSON object")
        })?;
        self.add(object.iter().map(|(name, value)| (name, value.clone())));
        Ok(())
    }

    /// Detach every buffered record and feed each, as a name/value map of
    /// its significant values, to `handler` in append order. `Ok(false)`
    /// stops early; an error is returned as-is. Records detached but not
    /// yet visited when the drain stops are discarded.
    pub fn range<F, E>(&self, mut handler: F) -> Result<(), E>
    where
        F: FnMut(Map<String, Value>) -> Result<bool, E>,
    {
        let (records, fields) = {
            let mut store = self.lock_store();
            (store.take(), self.registry.snapshot())
        };
        if records.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            records = records.len(),
            fields = fields.len(),
            "draining table"
        );

        for record in records {
            let dense = record.into_dense(fields.len());
            let mapping = significant_mapping(&fields, dense);
            tracing::trace!(values = mapping.len(), "emitting record");
            if !handler(mapping)? {
                break;
            }
        }
        Ok(())
    }

    /// Drain everything currently buffered into a vector.
    pub fn drain(&self) -> Vec<Map<String, Value>> {
        let mut out = Vec::new();
        let drained = self.range(|mapping| {
            out.push(mapping);
            Ok::<_, Infallible>(true)
        });
        match drained {
            Ok(()) => out,
            Err(never) => match never {},
        }
    }

    /// Total number of values set across all records ever added.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of records buffered and not yet drained.
    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fields(&self) -> FieldSnapshot {
        self.registry.snapshot()
    }

    fn lock_store(&self) -> MutexGuard<'_, RecordStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new(TableOptions::default())
    }
}

fn significant_mapping(fields: &FieldSnapshot, mut dense: DenseRecord) -> Map<String, Value> {
    let mut mapping = Map::new();
    for field in fields {
        let Some(value) = dense.get_mut(field.index()).and_then(Option::take) else {
            continue;
        };
        if is_significant(&value) {
            mapping.insert(field.name().to_string(), value);
        }
    }
    mapping
}
