//! Read-only HTTP and HTTPS handler.

use std::io::Read;
use std::time::Duration;

use super::{FileReference, Handler, url_base_name};
use crate::config::HttpOptions;
use crate::error::{ResourceError, Result};
use crate::progress::ProgressSink;

/// Network timeout applied when the handler options name none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolves `http://` and `https://` URLs.
#[derive(Clone)]
pub struct HttpHandler {
    agent: ureq::Agent,
}

impl HttpHandler {
    /// A handler whose requests time out per `options`.
    #[must_use]
    pub fn new(options: &HttpOptions) -> Self {
        let timeout = options
            .timeout_seconds
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self::new(&HttpOptions::default())
    }
}

impl Handler for HttpHandler {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }

    fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>> {
        Ok(Box::new(HttpFile {
            url: url.to_owned(),
            name: url_base_name(url).to_owned(),
            agent: self.agent.clone(),
        }))
    }
}

struct HttpFile {
    url: String,
    name: String,
    agent: ureq::Agent,
}

impl FileReference for HttpFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        let response = self
            .agent
            .head(&self.url)
            .call()
            .map_err(|err| ResourceError::transport(&self.url, err))?;
        response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| ResourceError::transport(&self.url, "response has no content length"))
    }

    fn reader(&self) -> Result<Box<dyn Read>> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|err| ResourceError::transport(&self.url, err))?;
        Ok(Box::new(response.into_body().into_reader()))
    }

    fn reader_uri(&self) -> String {
        self.url.clone()
    }

    fn write_from(&self, _source: &dyn FileReference, _progress: &dyn ProgressSink) -> Result<u64> {
        Err(ResourceError::transport(
            &self.url,
            "uploads over http are not supported",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::LocalFile;
    use crate::progress::NullProgress;

    #[test]
    fn supports_both_schemes() {
        let handler = HttpHandler::default();
        assert!(handler.supports("http://example.com/a.txt"));
        assert!(handler.supports("https://example.com/a.txt"));
        assert!(!handler.supports("ftp://example.com/a.txt"));
    }

    #[test]
    fn uploads_are_refused() {
        let handler = HttpHandler::default();
        let target = handler
            .resolve("https://example.com/releases/a-first.txt")
            .expect("resolves");
        assert_eq!(target.name(), "a-first.txt");

        let err = target
            .write_from(&LocalFile::new("a-first.txt"), &NullProgress)
            .expect_err("read-only");
        assert!(err.to_string().contains("not supported"));
    }
}
