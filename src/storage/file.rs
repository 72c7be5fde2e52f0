// Filesystem-backed storage service for `file://` URLs.
use std::fs::{self, Metadata};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use super::{ObjectKind, StorageObject, StorageService};
use crate::core::error::{Error, ErrorKind, io_error_kind};
use crate::uri::{file_from_url, open_reader_from_url, parse_url, path_to_url};

#[derive(Clone, Debug, Default)]
pub struct FileStorageService;

impl FileStorageService {
    pub fn new() -> Self {
        Self
    }
}

fn local_path(url: &str) -> Result<PathBuf, Error> {
    let parsed = parse_url(url)?;
    if parsed.scheme() != "file" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "invalid scheme, expected file but had: {}",
                parsed.scheme()
            ))
            .with_url(url));
    }
    file_from_url(url)
}

fn io_failure(err: std::io::Error, message: &str, path: &Path) -> Error {
    Error::new(io_error_kind(&err))
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn object_from_metadata(url: String, path: &Path, meta: &Metadata) -> StorageObject {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = if meta.is_dir() {
        ObjectKind::Directory
    } else {
        ObjectKind::File
    };
    let object = StorageObject::new(url, name, kind, meta.len());
    match meta.modified() {
        Ok(modified) => object.with_modified(OffsetDateTime::from(modified)),
        Err(_) => object,
    }
}

impl StorageService for FileStorageService {
    fn list(&self, url: &str) -> Result<Vec<StorageObject>, Error> {
        let path = local_path(url)?;
        let meta = fs::metadata(&path).map_err(|err| io_failure(err, "failed to stat", &path))?;
        if !meta.is_dir() {
            return Ok(vec![object_from_metadata(url.to_string(), &path, &meta)]);
        }

        let entries =
            fs::read_dir(&path).map_err(|err| io_failure(err, "failed to read directory", &path))?;
        let mut objects = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| io_failure(err, "failed to read directory entry", &path))?;
            let entry_path = entry.path();
            let entry_meta = entry
                .metadata()
                .map_err(|err| io_failure(err, "failed to stat", &entry_path))?;
            let entry_url = path_to_url(&entry_path)?;
            objects.push(object_from_metadata(entry_url, &entry_path, &entry_meta));
        }
        objects.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(objects)
    }

    fn exists(&self, url: &str) -> Result<bool, Error> {
        let path = local_path(url)?;
        path.try_exists()
            .map_err(|err| io_failure(err, "failed to check existence", &path))
    }

    fn object(&self, url: &str) -> Result<StorageObject, Error> {
        let path = local_path(url)?;
        let meta = fs::metadata(&path).map_err(|err| io_failure(err, "failed to stat", &path))?;
        Ok(object_from_metadata(url.to_string(), &path, &meta))
    }

    fn download(&self, object: &StorageObject) -> Result<Box<dyn Read + Send>, Error> {
        local_path(object.url())?;
        let (mut reader, _) = open_reader_from_url(object.url())?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read object")
                .with_url(object.url())
                .with_source(err)
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn upload(&self, url: &str, reader: &mut dyn Read) -> Result<(), Error> {
        let path = local_path(url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| io_failure(err, "failed to create parent directory", parent))?;
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read upload source")
                .with_url(url)
                .with_source(err)
        })?;
        fs::write(&path, &data).map_err(|err| io_failure(err, "failed to write object", &path))?;
        tracing::debug!(url, bytes = data.len(), "uploaded object");
        Ok(())
    }

    fn delete(&self, object: &StorageObject) -> Result<(), Error> {
        let path = local_path(object.url())?;
        let result = if object.is_dir() {
            fs::remove_dir(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|err| io_failure(err, "failed to delete object", &path))
    }

    fn register(&mut self, scheme: &str, _service: Box<dyn StorageService>) -> Result<(), Error> {
        Err(Error::new(ErrorKind::Usage)
            .with_message(format!("cannot register scheme {scheme}: unsupported by file storage")))
    }
}

#[cfg(test)]
mod tests {
    use super::FileStorageService;
    use crate::core::error::ErrorKind;
    use crate::storage::{ObjectKind, StorageService};
    use crate::uri::path_to_url;
    use std::io::Read;

    #[test]
    fn upload_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = path_to_url(dir.path().join("a/b/records.jsonl")).expect("url");
        let service = FileStorageService::new();

        assert!(!service.exists(&url).expect("exists"));
        service
            .upload(&url, &mut &b"{\"x\":1}\n"[..])
            .expect("upload");
        assert!(service.exists(&url).expect("exists"));

        let object = service.object(&url).expect("object");
        assert_eq!(object.name(), "records.jsonl");
        assert_eq!(object.kind(), ObjectKind::File);
        assert_eq!(object.size(), 8);
        assert!(object.modified().is_some());

        let mut text = String::new();
        service
            .download(&object)
            .expect("download")
            .read_to_string(&mut text)
            .expect("read");
        assert_eq!(text, "{\"x\":1}\n");
    }

    #[test]
    fn list_directory_is_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.json"), b"{}").expect("write");
        std::fs::write(dir.path().join("a.json"), b"{}").expect("write");
        std::fs::create_dir(dir.path().join("c")).expect("mkdir");
        let url = path_to_url(dir.path()).expect("url");

        let service = FileStorageService::new();
        let objects = service.list(&url).expect("list");
        let names = objects.iter().map(|o| o.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.json", "b.json", "c"]);
        assert!(objects[0].url().ends_with("/a.json"));
        assert!(objects[2].is_dir());
    }

    #[test]
    fn list_file_yields_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("one.json");
        std::fs::write(&path, b"{}").expect("write");
        let url = path_to_url(&path).expect("url");

        let objects = FileStorageService::new().list(&url).expect("list");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].url(), url);
    }

    #[test]
    fn delete_removes_files_and_empty_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_url = path_to_url(dir.path().join("gone.json")).expect("url");
        let dir_url = path_to_url(dir.path().join("empty")).expect("url");
        std::fs::create_dir(dir.path().join("empty")).expect("mkdir");

        let service = FileStorageService::new();
        service.upload(&file_url, &mut &b"{}"[..]).expect("upload");
        let object = service.object(&file_url).expect("object");
        service.delete(&object).expect("delete");
        assert!(!service.exists(&file_url).expect("exists"));

        let object = service.object(&dir_url).expect("object");
        service.delete(&object).expect("delete dir");
        assert!(!service.exists(&dir_url).expect("exists"));

        let err = service.delete(&object).expect_err("already gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn non_file_urls_are_rejected() {
        let service = FileStorageService::new();
        for url in ["http://example.com/a", "s3://bucket/key"] {
            let err = service.exists(url).expect_err("scheme");
            assert_eq!(err.kind(), ErrorKind::Usage);
            assert!(err.message().unwrap_or_default().contains("expected file"));
        }
    }

    #[test]
    fn register_is_unsupported() {
        let mut service = FileStorageService::new();
        let err = service
            .register("mem", Box::new(FileStorageService::new()))
            .expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = path_to_url(dir.path().join("nope")).expect("url");
        let err = FileStorageService::new().object(&url).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
