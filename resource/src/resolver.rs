//! Routing of location strings to transport handlers.
//!
//! The resolver is an explicit value built once per invocation. Configured
//! handlers are consulted first, in configuration order, so operator options
//! such as credentials take precedence over the anonymous defaults that
//! follow them.

use regex::Regex;

use crate::config::HandlerConfig;
use crate::error::{ResourceError, Result};
use crate::handler::{
    EmptySchemeHandler, FileHandler, FileReference, FtpHandler, Handler, HttpHandler, S3Handler,
    handler_for,
};

/// A handler plus the patterns scoping it.
pub struct ScopedHandler {
    handler: Box<dyn Handler>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ScopedHandler {
    /// Scope `handler` to URLs matching any of `include` (or all URLs when
    /// empty) and none of `exclude`.
    #[must_use]
    pub fn new(handler: Box<dyn Handler>, include: Vec<Regex>, exclude: Vec<Regex>) -> Self {
        Self {
            handler,
            include,
            exclude,
        }
    }

    /// An unscoped handler.
    #[must_use]
    pub fn unscoped(handler: Box<dyn Handler>) -> Self {
        Self::new(handler, Vec::new(), Vec::new())
    }

    /// Whether the patterns admit `url` and the handler understands it.
    #[must_use]
    pub fn is_eligible(&self, url: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(url));
        let excluded = self.exclude.iter().any(|re| re.is_match(url));
        included && !excluded && self.handler.supports(url)
    }

    /// The wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

/// An ordered handler registry.
pub struct LocationResolver {
    handlers: Vec<ScopedHandler>,
}

impl LocationResolver {
    /// A resolver over exactly `handlers`, without defaults.
    #[must_use]
    pub fn new(handlers: Vec<ScopedHandler>) -> Self {
        Self { handlers }
    }

    /// The default chain: file, ftp, http, anonymous object storage, and
    /// bare paths as local files.
    #[must_use]
    pub fn default_handlers() -> Vec<ScopedHandler> {
        vec![
            ScopedHandler::unscoped(Box::new(FileHandler)),
            ScopedHandler::unscoped(Box::new(FtpHandler::default())),
            ScopedHandler::unscoped(Box::new(HttpHandler::default())),
            ScopedHandler::unscoped(Box::new(S3Handler::default())),
            ScopedHandler::unscoped(Box::new(EmptySchemeHandler)),
        ]
    }

    /// Configured handlers in order, followed by the defaults.
    #[must_use]
    pub fn from_configs(configs: &[HandlerConfig]) -> Self {
        let mut handlers: Vec<ScopedHandler> = configs
            .iter()
            .map(|config| {
                ScopedHandler::new(
                    handler_for(&config.kind),
                    config.include.clone(),
                    config.exclude.clone(),
                )
            })
            .collect();
        handlers.extend(Self::default_handlers());
        Self::new(handlers)
    }

    /// The first eligible handler for `url`.
    #[must_use]
    pub fn handler_for(&self, url: &str) -> Option<&dyn Handler> {
        self.handlers
            .iter()
            .find(|scoped| scoped.is_eligible(url))
            .map(ScopedHandler::handler)
    }

    /// Resolve `url` through the first eligible handler.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::NoHandlerForScheme`] when no handler is
    /// eligible, or the handler's own resolution error.
    pub fn resolve(&self, url: &str) -> Result<Box<dyn FileReference>> {
        let handler = self
            .handler_for(url)
            .ok_or_else(|| ResourceError::NoHandlerForScheme {
                url: url.to_owned(),
            })?;
        log::debug!("resolving {url} with the {} handler", handler.name());
        handler.resolve(url)
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(Self::default_handlers())
    }
}
