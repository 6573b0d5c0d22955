//! Publishing files to mirror destinations with bounded retries.
//!
//! Destinations are templates such as `s3://bucket/{{ .SHA1 }}` rendered per
//! file. Mirrors are processed one at a time; a destination that still fails
//! after the last attempt aborts the publish, leaving earlier uploads in
//! place.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use metalink_common::{HashAlgorithm, Location, ManifestFile};
use regex::Regex;

use crate::config::MirrorFileConfig;
use crate::error::{ResourceError, Result};
use crate::handler::FileReference;
use crate::progress::ProgressSink;
use crate::resolver::LocationResolver;

/// Attempts per destination before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);

static PLACEHOLDER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\.(\w+)\s*\}\}"));

/// Values available to `{{ .Key }}` placeholders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateValues {
    values: BTreeMap<&'static str, String>,
}

impl TemplateValues {
    /// `Name`, `Version`, `Size` and every known digest of `file`.
    #[must_use]
    pub fn for_file(file: &ManifestFile) -> Self {
        let mut values = BTreeMap::new();
        values.insert("Name", file.name.clone());
        values.insert("Version", file.version.clone());
        values.insert("Size", file.size.to_string());
        for algorithm in HashAlgorithm::STRONGEST_FIRST {
            if let Some(digest) = file.hash(algorithm) {
                values.insert(algorithm.template_key(), digest.to_owned());
            }
        }
        Self { values }
    }

    /// Only `Version`, as used when naming a manifest.
    #[must_use]
    pub fn for_version(version: &str) -> Self {
        let mut values = BTreeMap::new();
        values.insert("Version", version.to_owned());
        Self { values }
    }
}

/// Substitute every `{{ .Key }}` placeholder in `template`.
///
/// # Errors
///
/// Returns [`ResourceError::Template`] when a placeholder names a key with
/// no value.
///
/// # Examples
///
/// ```
/// use metalink_common::ManifestFile;
/// use metalink_resource::mirror::{TemplateValues, render_template};
///
/// let file = ManifestFile::new("a.tgz", "1.2.0");
/// let values = TemplateValues::for_file(&file);
/// let rendered = render_template("s3://bucket/{{ .Version }}/{{.Name}}", &values)
///     .expect("renders");
/// assert_eq!(rendered, "s3://bucket/1.2.0/a.tgz");
/// ```
pub fn render_template(template: &str, values: &TemplateValues) -> Result<String> {
    let placeholder = PLACEHOLDER.as_ref().map_err(|err| ResourceError::Template {
        template: template.to_owned(),
        reason: err.to_string(),
    })?;
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for captures in placeholder.captures_iter(template) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = values
            .values
            .get(key.as_str())
            .ok_or_else(|| ResourceError::Template {
                template: template.to_owned(),
                reason: format!("no value for {}", key.as_str()),
            })?;
        rendered.push_str(template.get(last..whole.start()).unwrap_or_default());
        rendered.push_str(value);
        last = whole.end();
    }
    rendered.push_str(template.get(last..).unwrap_or_default());
    Ok(rendered)
}

/// Bounded retry with exponential back-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before `attempt` (1-based); zero for the first.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(MAX_DELAY)
    }

    /// Run `operation` until it succeeds or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::MirrorUploadFailed`] wrapping the error of
    /// the final attempt.
    pub fn run<T>(
        &self,
        destination: &str,
        mut operation: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    log::warn!(
                        "upload to {destination} failed: {err}; retrying (attempt #{attempt}) in {}ms",
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    return Err(ResourceError::MirrorUploadFailed {
                        destination: destination.to_owned(),
                        cause: Box::new(err),
                    });
                }
            }
        }
    }
}

/// Upload `local` to every mirror and record the resulting locations on
/// `file`, in mirror order.
///
/// # Errors
///
/// Returns [`ResourceError::Template`] for an unrenderable destination, the
/// resolver's error for an unroutable one, and
/// [`ResourceError::MirrorUploadFailed`] once retries are exhausted.
pub fn mirror_file(
    file: &mut ManifestFile,
    local: &dyn FileReference,
    mirrors: &[MirrorFileConfig],
    resolver: &LocationResolver,
    retry: &RetryPolicy,
    progress: &dyn ProgressSink,
) -> Result<()> {
    let values = TemplateValues::for_file(file);
    for mirror in mirrors {
        let destination = render_template(&mirror.destination, &values)?;
        let remote = resolver.resolve(&destination)?;
        retry.run(&destination, |attempt| {
            log::info!("uploading {} to {destination} (attempt #{attempt})", file.name);
            remote.write_from(local, progress)
        })?;
        file.locations.push(Location {
            url: remote.reader_uri(),
            priority: mirror.priority,
            label: mirror.location.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
