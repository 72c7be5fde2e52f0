//! Purpose: URL-addressed storage objects and the service trait that moves bytes for them.
//! Exports: `StorageService`, `StorageObject`, `ObjectKind`, `FileStorageService`, `for_url`.
//! Role: Collaborator for exporting drained records; the table core never calls it.
//! Invariants: Services reject URLs outside the schemes they serve with `ErrorKind::Usage`.
//! Invariants: Listing output is sorted by URL so results are deterministic.

mod file;

use std::io::Read;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::error::{Error, ErrorKind};
use crate::uri::parse_url;

pub use file::FileStorageService;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Directory,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageObject {
    url: String,
    name: String,
    kind: ObjectKind,
    size: u64,
    modified: Option<OffsetDateTime>,
}

impl StorageObject {
    pub fn new(url: impl Into<String>, name: impl Into<String>, kind: ObjectKind, size: u64) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            kind,
            size,
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Directory
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> Option<OffsetDateTime> {
        self.modified
    }

    pub fn modified_rfc3339(&self) -> Option<String> {
        self.modified.and_then(|ts| ts.format(&Rfc3339).ok())
    }
}

pub trait StorageService: Send + Sync {
    /// Objects under `url`: the object itself for a file, its entries for a directory.
    fn list(&self, url: &str) -> Result<Vec<StorageObject>, Error>;

    fn exists(&self, url: &str) -> Result<bool, Error>;

    fn object(&self, url: &str) -> Result<StorageObject, Error>;

    /// Full content of `object`, buffered in memory.
    fn download(&self, object: &StorageObject) -> Result<Box<dyn Read + Send>, Error>;

    /// Write everything `reader` yields to `url`, creating parents as needed.
    fn upload(&self, url: &str, reader: &mut dyn Read) -> Result<(), Error>;

    fn delete(&self, object: &StorageObject) -> Result<(), Error>;

    /// Route `scheme` to another service, where supported.
    fn register(&mut self, scheme: &str, service: Box<dyn StorageService>) -> Result<(), Error>;
}

/// Storage service able to serve `url`.
pub fn for_url(url: &str) -> Result<Box<dyn StorageService>, Error> {
    let parsed = parse_url(url)?;
    match parsed.scheme() {
        "file" => Ok(Box::new(FileStorageService::new())),
        scheme => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("no storage service for scheme: {scheme}"))
            .with_url(url)),
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectKind, StorageObject, for_url};
    use crate::core::error::ErrorKind;
    use time::OffsetDateTime;

    #[test]
    fn file_scheme_has_a_service() {
        let service = for_url("file:///tmp").expect("service");
        assert!(service.exists("file:///").expect("exists"));
    }

    #[test]
    fn other_schemes_have_no_service() {
        let err = for_url("s3://bucket/key").err().expect("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn modified_formats_as_rfc3339() {
        let modified = OffsetDateTime::from_unix_timestamp(1_769_904_000).expect("timestamp");
        let object =
            StorageObject::new("file:///a", "a", ObjectKind::File, 3).with_modified(modified);
        assert_eq!(object.modified_rfc3339().as_deref(), Some("2026-02-01T00:00:00Z"));
        assert!(!object.is_dir());
        assert_eq!(object.size(), 3);
    }

    #[test]
    fn object_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ObjectKind::Directory).expect("json"),
            "directory"
        );
        assert_eq!(serde_json::to_value(ObjectKind::File).expect("json"), "file");
    }
}
