//! Transport handlers and the file references they produce.
//!
//! A [`Handler`] recognizes the locations it can service and resolves each
//! one to a [`FileReference`]: a handle that can be sized, read any number
//! of times, and written from another reference. Handlers wrap existing
//! client libraries; they implement no protocol of their own.
//!
//! | Handler | Locations | Writes |
//! |---------|-----------|--------|
//! | [`FileHandler`] | `file://` | yes |
//! | [`EmptySchemeHandler`] | bare paths | yes |
//! | [`HttpHandler`] | `http://`, `https://` | no |
//! | [`FtpHandler`] | `ftp://` | yes |
//! | [`S3Handler`] | `s3://bucket/key` | yes |

mod file;
mod ftp;
mod http;
mod s3;

pub use file::{EmptySchemeHandler, FileHandler, LocalFile};
pub use ftp::FtpHandler;
pub use http::HttpHandler;
pub use s3::S3Handler;

use std::io::{self, Read, Write};

use crate::config::HandlerKind;
use crate::error::{ResourceError, Result};
use crate::progress::{ProgressReader, ProgressSink};

/// A resolved location.
pub trait FileReference {
    /// Base name of the referenced file.
    fn name(&self) -> &str;

    /// Size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Transport`] when the size cannot be determined.
    fn size(&self) -> Result<u64>;

    /// A fresh stream over the file's bytes; may be opened repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Transport`] when the file cannot be opened.
    fn reader(&self) -> Result<Box<dyn Read>>;

    /// A URI other processes can use to fetch the file again.
    fn reader_uri(&self) -> String;

    /// Replace this file's content with the bytes of `source`, reporting
    /// progress as bytes arrive. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Transport`] when either side fails or the
    /// handler cannot write.
    fn write_from(&self, source: &dyn FileReference, progress: &dyn ProgressSink) -> Result<u64>;
}

/// A transport capable of resolving some locations.
#[cfg_attr(test, mockall::automock)]
pub trait Handler: Send + Sync {
    /// Short handler name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the handler understands `url` at all.
    fn supports(&self, url: &str) -> bool;

    /// Resolve `url` to a reference.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Transport`] or
    /// [`ResourceError::Configuration`] when `url` cannot be addressed.
    fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>>;
}

/// Build the handler for a validated configuration.
#[must_use]
pub fn handler_for(kind: &HandlerKind) -> Box<dyn Handler> {
    match kind {
        HandlerKind::S3(options) => Box::new(S3Handler::new(options.clone())),
        HandlerKind::Ftp(options) => Box::new(FtpHandler::new(options.clone())),
        HandlerKind::Http(options) => Box::new(HttpHandler::new(options)),
        HandlerKind::File => Box::new(FileHandler),
    }
}

/// Base name of the path component of `url`.
pub(crate) fn url_base_name(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url.get(..end).unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Stream `source` into `sink`, reporting progress under `name`.
pub(crate) fn copy_with_progress(
    source: &dyn FileReference,
    name: &str,
    sink: &mut dyn Write,
    progress: &dyn ProgressSink,
) -> Result<u64> {
    let reader = source.reader()?;
    let mut counted = ProgressReader::new(reader, name, progress);
    io::copy(&mut counted, sink)
        .map_err(|err| ResourceError::transport(source.reader_uri(), err))
}

/// Read all of `source` into memory, reporting progress under `name`.
pub(crate) fn read_with_progress(
    source: &dyn FileReference,
    name: &str,
    progress: &dyn ProgressSink,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    copy_with_progress(source, name, &mut buffer, progress)?;
    Ok(buffer)
}
