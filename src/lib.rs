//! Purpose: Library crate behind the `sparsetab` CLI and integration tests.
//! Exports: `core` (registry, codec, table, errors), `api`, `storage`, `uri`, `ingest`.
//! Role: Sparse record accumulation in `core`; URL-addressed I/O kept outside it.
//! Invariants: `core` never touches storage or the network.
//! Invariants: No process-wide mutable state; tables are explicit values.
pub mod api;
pub mod core;
pub mod ingest;
pub mod storage;
pub mod uri;
