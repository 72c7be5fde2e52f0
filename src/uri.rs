//! Purpose: Resolve URLs to readers, local paths, and mime types.
//! Exports: `FILE_SCHEME`, `extract_mime_type`, `open_reader_from_url`, `file_from_url`, `open_url`, `path_to_url`.
//! Role: Shared URL boundary for the storage service, ingest, and CLI.
//! Invariants: Only `file` URLs map to local paths; `http(s)` is read-only.
//! Invariants: Unknown extensions resolve to `text/plain`.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use url::Url;

use crate::core::error::{Error, ErrorKind, io_error_kind};

pub const FILE_SCHEME: &str = "file://";

const DEFAULT_MIME_TYPE: &str = "text/plain";

const MIME_TYPES: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("jsonl", "application/x-ndjson"),
    ("ndjson", "application/x-ndjson"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("xml", "application/xml"),
    ("yaml", "application/x-yaml"),
    ("yml", "application/x-yaml"),
    ("gz", "application/gzip"),
    ("zip", "application/zip"),
    ("tar", "application/x-tar"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
];

/// Mime type guessed from the extension of `path`.
pub fn extract_mime_type(path: impl AsRef<Path>) -> &'static str {
    let Some(extension) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
        return DEFAULT_MIME_TYPE;
    };
    MIME_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid url")
            .with_url(raw)
            .with_source(err)
    })
}

fn unsupported_scheme(url: &Url, raw: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("unsupported url scheme: {}", url.scheme()))
        .with_url(raw)
}

fn local_path(url: &Url, raw: &str) -> Result<PathBuf, Error> {
    url.to_file_path().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("file url must name an absolute local path")
            .with_url(raw)
    })
}

/// Open `raw` for reading, returning the reader and its mime type.
pub fn open_reader_from_url(raw: &str) -> Result<(Box<dyn Read + Send>, String), Error> {
    let url = parse_url(raw)?;
    match url.scheme() {
        "http" | "https" => {
            let response = ureq::get(raw).call().map_err(|err| match err {
                ureq::Error::Status(404, _) => Error::new(ErrorKind::NotFound)
                    .with_message("remote resource not found")
                    .with_url(raw),
                ureq::Error::Status(code, _) => Error::new(ErrorKind::Io)
                    .with_message(format!("request failed with status {code}"))
                    .with_url(raw),
                ureq::Error::Transport(transport) => Error::new(ErrorKind::Io)
                    .with_message(format!("request failed: {transport}"))
                    .with_url(raw),
            })?;
            let mime_type = response
                .header("Content-Type")
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string();
            let reader: Box<dyn Read + Send> = response.into_reader();
            Ok((reader, mime_type))
        }
        "file" => {
            let path = local_path(&url, raw)?;
            let file = File::open(&path).map_err(|err| {
                Error::new(io_error_kind(&err))
                    .with_message("failed to open file")
                    .with_url(raw)
                    .with_source(err)
            })?;
            let reader: Box<dyn Read + Send> = Box::new(file);
            Ok((reader, extract_mime_type(&path).to_string()))
        }
        _ => Err(unsupported_scheme(&url, raw)),
    }
}

/// Local path named by a `file` URL.
pub fn file_from_url(raw: &str) -> Result<PathBuf, Error> {
    let url = parse_url(raw)?;
    match url.scheme() {
        "file" => local_path(&url, raw),
        _ => Err(unsupported_scheme(&url, raw)),
    }
}

/// Open the file named by a `file` URL with the given options.
pub fn open_url(raw: &str, options: &OpenOptions) -> Result<File, Error> {
    let path = file_from_url(raw)?;
    options.open(&path).map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message("failed to open file")
            .with_url(raw)
            .with_path(&path)
            .with_source(err)
    })
}

/// `file` URL for an absolute local path.
pub fn path_to_url(path: impl AsRef<Path>) -> Result<String, Error> {
    let path = path.as_ref();
    Url::from_file_path(path)
        .map(|url| url.to_string())
        .map_err(|_| {
            Error::new(ErrorKind::Usage)
                .with_message("path must be absolute")
                .with_path(path)
        })
}
