// Core modules implementing the field registry, record codec, and drainable table.
pub mod codec;
pub mod error;
pub mod field;
pub mod table;
pub mod value;
