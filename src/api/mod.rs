//! Purpose: Define the public Rust API boundary for sparsetab.
//! Exports: Table types, codec, errors, storage, and load/drain helpers used by the CLI.
//! Role: One import path for callers; internal module layout may move underneath it.
//! Invariants: Additive-only surface; nothing here holds process-wide state.
//! Invariants: Transfer helpers are the only place tables meet storage.

mod transfer;

pub use crate::core::codec::{CompactRecord, DenseRecord, Slot};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::field::{Field, FieldSnapshot};
pub use crate::core::table::{Table, TableOptions};
pub use crate::core::value::{ValueKind, is_significant};
pub use crate::ingest::{ErrorPolicy, FailureKind, IngestConfig, IngestFailure, IngestOutcome};
pub use crate::storage::{FileStorageService, ObjectKind, StorageObject, StorageService, for_url};
pub use transfer::{DrainOutcome, drain_to, load, load_reader};
